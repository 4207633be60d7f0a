use encoding_rs::Encoding;
use scraper::Html;
use tracing::trace;

use crate::config::ConfigError;

/// Bytes sampled by the statistical detector when it is consulted.
const SNIFF_LEN: usize = 4096;

/// Unicode "Specials" block. A correct decoding of real text contains none of
/// these; U+FFFD in particular marks bytes the decoder could not map.
pub fn is_special(c: char) -> bool {
    ('\u{FFF0}'..='\u{FFFF}').contains(&c)
}

/// Number of specials code points in `text`.
pub fn invalidity_score(text: &str) -> usize {
    text.chars().filter(|c| is_special(*c)).count()
}

/// Looks up a charset label such as `UTF-8`, `cp1251` or `iso-8859-1`.
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Outcome of one candidate decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub encoding: &'static Encoding,
    pub score: usize,
}

/// Best decoding found for a document.
#[derive(Debug)]
pub struct Resolved {
    pub encoding: &'static Encoding,
    pub document: Html,
    pub score: usize,
    /// Every candidate tried, in order.
    pub attempts: Vec<Attempt>,
}

/// Picks the decoding that yields the fewest specials code points.
#[derive(Debug, Clone)]
pub struct CharsetResolver {
    fallbacks: Vec<&'static Encoding>,
    sniff: bool,
}

impl CharsetResolver {
    pub fn new(fallbacks: &[String]) -> Result<Self, ConfigError> {
        let fallbacks = fallbacks
            .iter()
            .map(|label| lookup(label).ok_or_else(|| ConfigError::UnknownCharset(label.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            fallbacks,
            sniff: true,
        })
    }

    /// Disables the statistical guess appended after the configured fallbacks.
    pub fn without_sniffing(mut self) -> Self {
        self.sniff = false;
        self
    }

    /// Candidate order: the hint when supported, the fallbacks, then the
    /// detector's guess. Each encoding appears once.
    pub fn candidates(&self, bytes: &[u8], hint: Option<&str>) -> Vec<&'static Encoding> {
        let mut plan: Vec<&'static Encoding> = Vec::with_capacity(self.fallbacks.len() + 2);
        let mut push = |encoding: &'static Encoding| {
            if !plan.iter().any(|seen| std::ptr::eq(*seen, encoding)) {
                plan.push(encoding);
            }
        };

        if let Some(encoding) = hint.and_then(lookup) {
            push(encoding);
        }
        for encoding in &self.fallbacks {
            push(encoding);
        }
        if self.sniff {
            let mut detector = chardetng::EncodingDetector::new();
            detector.feed(&bytes[..bytes.len().min(SNIFF_LEN)], true);
            push(detector.guess(None, true));
        }
        plan
    }

    /// Decodes `bytes` with each candidate in turn and keeps the document
    /// whose text scores lowest. Stops at the first candidate scoring zero.
    /// Returns `None` only when there is no candidate at all.
    pub fn resolve(&self, bytes: &[u8], hint: Option<&str>) -> Option<Resolved> {
        let mut best: Option<(&'static Encoding, Html, usize)> = None;
        let mut attempts = Vec::new();

        for encoding in self.candidates(bytes, hint) {
            let (decoded, _) = encoding.decode_with_bom_removal(bytes);
            let document = Html::parse_document(&decoded);
            let score = document_score(&document);
            trace!(charset = encoding.name(), score, "charset candidate scored");
            attempts.push(Attempt { encoding, score });

            let improves = best.as_ref().is_none_or(|(_, _, best_score)| score < *best_score);
            if improves {
                best = Some((encoding, document, score));
            }
            if score == 0 {
                break;
            }
        }

        best.map(|(encoding, document, score)| Resolved {
            encoding,
            document,
            score,
            attempts,
        })
    }
}

fn document_score(document: &Html) -> usize {
    document
        .root_element()
        .text()
        .map(invalidity_score)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CharsetResolver {
        let labels: Vec<String> = ["UTF-8", "ISO-8859-1", "GB2312", "CP1251", "CP1252"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        CharsetResolver::new(&labels).unwrap().without_sniffing()
    }

    fn latin1_page() -> Vec<u8> {
        let mut bytes = b"<html><body><p>Caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b" cr");
        bytes.push(0xE8);
        bytes.extend_from_slice(b"me br");
        bytes.push(0xFB);
        bytes.extend_from_slice(b"l\xE9e</p></body></html>");
        bytes
    }

    #[test]
    fn counts_specials_only() {
        assert_eq!(invalidity_score("plain text"), 0);
        assert_eq!(invalidity_score("bad \u{FFFD} and \u{FFFC}"), 2);
        assert_eq!(invalidity_score("Prague \u{2013} Praha"), 0);
    }

    #[test]
    fn candidate_plan_starts_with_hint_and_skips_duplicates() {
        let plan = resolver().candidates(b"", Some("windows-1251"));
        let names: Vec<&str> = plan.iter().map(|e| e.name()).collect();
        // ISO-8859-1 and CP1252 are both windows-1252 in the WHATWG registry.
        assert_eq!(names, vec!["windows-1251", "UTF-8", "windows-1252", "GBK"]);
    }

    #[test]
    fn unsupported_hint_is_ignored() {
        let plan = resolver().candidates(b"", Some("x-unknown"));
        assert_eq!(plan[0].name(), "UTF-8");
    }

    #[test]
    fn stops_at_first_clean_candidate() {
        let resolved = resolver()
            .resolve("<p>Hello, svět!</p>".as_bytes(), Some("utf-8"))
            .unwrap();
        assert_eq!(resolved.encoding, encoding_rs::UTF_8);
        assert_eq!(resolved.score, 0);
        assert_eq!(resolved.attempts.len(), 1);
    }

    #[test]
    fn falls_back_when_declared_charset_is_wrong() {
        let resolved = resolver().resolve(&latin1_page(), Some("utf-8")).unwrap();
        assert_eq!(resolved.encoding, encoding_rs::WINDOWS_1252);
        assert_eq!(resolved.score, 0);
        assert_eq!(resolved.attempts.len(), 2);
        assert!(resolved.attempts[0].score > 0);
        let text: String = resolved.document.root_element().text().collect();
        assert!(text.contains("Café crème brûlée"));
    }

    #[test]
    fn chosen_score_is_minimum_over_attempts() {
        let resolver = CharsetResolver::new(&["UTF-8".to_string()])
            .unwrap()
            .without_sniffing();
        let resolved = resolver.resolve(&latin1_page(), None).unwrap();
        let min = resolved.attempts.iter().map(|a| a.score).min().unwrap();
        assert_eq!(resolved.score, min);
        assert!(resolved.score > 0);

        let resolved = self::resolver().resolve(&latin1_page(), Some("gb2312")).unwrap();
        let min = resolved.attempts.iter().map(|a| a.score).min().unwrap();
        assert_eq!(resolved.score, min);
        assert_eq!(resolved.attempts.last().unwrap().score, 0);
    }

    #[test]
    fn no_candidates_means_no_document() {
        let resolver = CharsetResolver::new(&[]).unwrap().without_sniffing();
        assert!(resolver.resolve(b"<p>x</p>", None).is_none());
    }
}
