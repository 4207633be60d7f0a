//! Tab-separated row formats shared by both phases and the crawler.
//!
//! Text rows: `domain, language, confidence, uri, text`.
//! Domain rows: `domain, uri count`, then a `count, length` pair per
//! configured language, in configured order.

use thiserror::Error;

use crate::extractor::{Classification, DomainStats, LanguageStats, TextRecord};

pub const DELIMITER: char = '\t';
const TEXT_FIELDS: usize = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: String, found: usize },

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("dangling escape at end of field")]
    DanglingEscape,

    #[error("invalid number in field '{field}': {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("empty domain")]
    EmptyDomain,
}

/// Escapes the backslash and the characters that would break a row.
pub fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(field: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => return Err(CodecError::InvalidEscape(other)),
            None => return Err(CodecError::DanglingEscape),
        }
    }
    Ok(out)
}

/// One text row, without the line terminator. An unclassified record
/// leaves the language and confidence fields empty.
pub fn encode_text_record(record: &TextRecord) -> String {
    let (language, confidence) = match &record.classification {
        Some(c) => (escape(&c.language), c.confidence.to_string()),
        None => (String::new(), String::new()),
    };
    [
        escape(&record.domain),
        language,
        confidence,
        escape(&record.uri),
        escape(&record.text),
    ]
    .join("\t")
}

pub fn decode_text_record(line: &str) -> Result<TextRecord, CodecError> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() != TEXT_FIELDS {
        return Err(CodecError::FieldCount {
            expected: TEXT_FIELDS.to_string(),
            found: fields.len(),
        });
    }

    let domain = unescape(fields[0])?;
    if domain.is_empty() {
        return Err(CodecError::EmptyDomain);
    }
    let classification = match (fields[1], fields[2]) {
        ("", "") => None,
        (language, confidence) => Some(Classification {
            language: unescape(language)?,
            confidence: confidence.parse().map_err(|_| CodecError::InvalidNumber {
                field: "confidence",
                value: confidence.to_string(),
            })?,
        }),
    };

    Ok(TextRecord {
        domain,
        uri: unescape(fields[3])?,
        classification,
        text: unescape(fields[4])?,
    })
}

pub fn encode_domain_stats(stats: &DomainStats) -> String {
    let mut fields = vec![escape(&stats.domain), stats.unique_uri_count.to_string()];
    for language in &stats.languages {
        fields.push(language.unique_text_count.to_string());
        fields.push(language.total_text_length.to_string());
    }
    fields.join("\t")
}

/// Decodes a domain row written for `languages`.
pub fn decode_domain_stats(line: &str, languages: &[String]) -> Result<DomainStats, CodecError> {
    let (domain, unique_uri_count, pairs) = split_domain_row(line)?;
    if pairs.len() != languages.len() {
        return Err(CodecError::FieldCount {
            expected: (2 + 2 * languages.len()).to_string(),
            found: 2 + 2 * pairs.len(),
        });
    }
    Ok(DomainStats {
        domain,
        unique_uri_count,
        languages: languages
            .iter()
            .zip(pairs)
            .map(|(language, (count, length))| LanguageStats {
                language: language.clone(),
                unique_text_count: count,
                total_text_length: length,
            })
            .collect(),
    })
}

/// Domain key of a domain row. The remaining fields are validated too, so a
/// file that is not phase-1 output is rejected rather than half-read.
pub fn domain_key(line: &str) -> Result<String, CodecError> {
    split_domain_row(line).map(|(domain, _, _)| domain)
}

fn split_domain_row(line: &str) -> Result<(String, u64, Vec<(u64, u64)>), CodecError> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() < 2 || fields.len() % 2 != 0 {
        return Err(CodecError::FieldCount {
            expected: "an even number of at least 2".to_string(),
            found: fields.len(),
        });
    }

    let domain = unescape(fields[0])?;
    if domain.is_empty() {
        return Err(CodecError::EmptyDomain);
    }
    let unique_uri_count = number("uri count", fields[1])?;
    let pairs = fields[2..]
        .chunks_exact(2)
        .map(|pair| Ok((number("text count", pair[0])?, number("text length", pair[1])?)))
        .collect::<Result<Vec<_>, CodecError>>()?;
    Ok((domain, unique_uri_count, pairs))
}

fn number(field: &'static str, value: &str) -> Result<u64, CodecError> {
    value.parse().map_err(|_| CodecError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TextRecord {
        TextRecord {
            domain: "example.com".to_string(),
            uri: "https://example.com/a?b=c\td".to_string(),
            classification: Some(Classification {
                language: "en".to_string(),
                confidence: 0.995,
            }),
            text: "A passage with a \\ backslash.".to_string(),
        }
    }

    #[test]
    fn text_row_layout() {
        assert_eq!(
            encode_text_record(&record()),
            "example.com\ten\t0.995\thttps://example.com/a?b=c\\td\tA passage with a \\\\ backslash."
        );
    }

    #[test]
    fn text_row_survives_delimiters() {
        let mut record = record();
        record.text = "line one\nline\ttwo\r\\n".to_string();
        let line = encode_text_record(&record);
        assert!(!line.contains('\n'));
        assert_eq!(line.split('\t').count(), 5);
        assert_eq!(decode_text_record(&line).unwrap(), record);
    }

    #[test]
    fn unclassified_record_has_empty_fields() {
        let mut record = record();
        record.classification = None;
        let line = encode_text_record(&record);
        assert!(line.starts_with("example.com\t\t\t"));
        assert_eq!(decode_text_record(&line).unwrap().classification, None);
    }

    #[test]
    fn rejects_bad_text_rows() {
        assert!(matches!(
            decode_text_record("example.com\ten\t0.9"),
            Err(CodecError::FieldCount { found: 3, .. })
        ));
        assert!(matches!(
            decode_text_record("example.com\ten\thigh\tu\tt"),
            Err(CodecError::InvalidNumber { field: "confidence", .. })
        ));
        assert_eq!(unescape("bad \\x"), Err(CodecError::InvalidEscape('x')));
        assert_eq!(unescape("bad \\"), Err(CodecError::DanglingEscape));
    }

    #[test]
    fn domain_row_layout() {
        let languages = vec!["en".to_string(), "cs".to_string()];
        let stats = DomainStats {
            domain: "example.com".to_string(),
            unique_uri_count: 3,
            languages: vec![
                LanguageStats {
                    language: "en".to_string(),
                    unique_text_count: 2,
                    total_text_length: 250,
                },
                LanguageStats {
                    language: "cs".to_string(),
                    unique_text_count: 1,
                    total_text_length: 130,
                },
            ],
        };
        let line = encode_domain_stats(&stats);
        assert_eq!(line, "example.com\t3\t2\t250\t1\t130");
        assert_eq!(decode_domain_stats(&line, &languages).unwrap(), stats);
        assert_eq!(domain_key(&line).unwrap(), "example.com");
    }

    #[test]
    fn rejects_bad_domain_rows() {
        assert!(domain_key("example.com").is_err());
        assert!(domain_key("example.com\t3\t2").is_err());
        assert!(domain_key("example.com\tmany").is_err());
        assert_eq!(domain_key("\t3"), Err(CodecError::EmptyDomain));
        assert!(decode_domain_stats("example.com\t3\t2\t250", &["en".into(), "cs".into()]).is_err());
    }
}
