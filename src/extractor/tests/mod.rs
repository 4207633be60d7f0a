use std::fs;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::extractor::charset::CharsetResolver;
use crate::extractor::{
    Extraction, ExtractError, Extractor, LanguageClassifier, LanguageGuess, RawRecord, RecordType,
    SkipReason, TextRecord, WhatlangClassifier,
};

/// Tags Czech-looking text as `cs` and everything else as `en`.
struct KeywordClassifier {
    probability: f64,
}

impl LanguageClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Vec<LanguageGuess> {
        let language = if text.contains("Praha") { "cs" } else { "en" };
        vec![LanguageGuess {
            language: language.to_string(),
            probability: self.probability,
        }]
    }
}

struct SilentClassifier;

impl LanguageClassifier for SilentClassifier {
    fn classify(&self, _text: &str) -> Vec<LanguageGuess> {
        Vec::new()
    }
}

fn extractor_with(classifier: Arc<dyn LanguageClassifier>, config: ExtractionConfig) -> Extractor {
    Extractor::new(config, classifier).unwrap()
}

fn extractor() -> Extractor {
    extractor_with(
        Arc::new(KeywordClassifier { probability: 0.999 }),
        ExtractionConfig::default(),
    )
}

fn http_response(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "HTTP/1.1 200 OK\r\nServer: fixture\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

fn texts(extraction: Extraction) -> Vec<TextRecord> {
    match extraction {
        Extraction::Texts(texts) => texts,
        Extraction::Skipped(reason) => panic!("record unexpectedly skipped: {reason:?}"),
    }
}

#[test]
fn test_extract_article_paragraphs() {
    let html = fs::read("src/extractor/tests/fixtures/article.html")
        .expect("Failed to read test fixture");
    let record = RawRecord::response(
        "https://example.com/article",
        http_response("text/html; charset=utf-8", &html),
    );

    let records = texts(extractor().extract(&record).unwrap());

    assert_eq!(records.len(), 2);
    assert!(records[0].text.starts_with("This is the first paragraph"));
    assert!(records[1].text.starts_with("This is the second paragraph"));
    for record in &records {
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.uri, "https://example.com/article");
        assert_eq!(record.language(), Some("en"));
        assert!(!record.text.contains('\n'));
        assert!(!record.text.contains("  "));
        assert!(!record.text.contains("script"));
    }
}

#[test]
fn test_latin1_paragraph_scenario() {
    let paragraph = "The quick brown fox jumps over the lazy dog while the farmer watches from the porch and the sun slowly sets behind the old red barn today. Good night!";
    assert_eq!(paragraph.len(), 150);

    let body = format!("<html><body><p>{paragraph}</p></body></html>");
    let record = RawRecord::response(
        "http://www.example.org/page.html",
        http_response("text/html; charset=ISO-8859-1", body.as_bytes()),
    );

    let records = texts(extractor().extract(&record).unwrap());

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].domain, "www.example.org");
    assert_eq!(records[0].language(), Some("en"));
    assert!(records[0].confidence().unwrap() >= 0.99);
    assert_eq!(records[0].text, paragraph);
}

#[test]
fn test_wrong_declared_charset_is_recovered() {
    let mut body = b"<html><body><p>".to_vec();
    let paragraph = "Le caf\u{e9} cr\u{e8}me est servi avec une br\u{fb}l\u{e9}e dans ce petit restaurant parisien tr\u{e8}s connu du quartier latin, pr\u{e8}s de la Seine.";
    let (latin1, _, _) = encoding_rs::WINDOWS_1252.encode(paragraph);
    body.extend_from_slice(&latin1);
    body.extend_from_slice(b"</p></body></html>");

    let record = RawRecord::response(
        "https://example.fr/",
        http_response("text/html; charset=utf-8", &body),
    );
    let config = ExtractionConfig {
        languages: vec!["en".to_string()],
        ..ExtractionConfig::default()
    };
    let extractor = extractor_with(Arc::new(KeywordClassifier { probability: 1.0 }), config);

    let records = texts(extractor.extract(&record).unwrap());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, paragraph);
}

#[test]
fn test_declared_charset_field_overrides_header() {
    let paragraph = "Москва является столицей России и крупнейшим по численности населения городом страны, а также её политическим центром.";
    let (cp1251, _, _) = encoding_rs::WINDOWS_1251.encode(paragraph);
    let mut body = b"<html><body><p>".to_vec();
    body.extend_from_slice(&cp1251);
    body.extend_from_slice(b"</p></body></html>");

    let mut record = RawRecord::response("https://example.ru/", http_response("text/html", &body));
    let resolver = CharsetResolver::new(&["UTF-8".to_string()]).unwrap().without_sniffing();
    let extractor = extractor().with_resolver(resolver);

    // UTF-8 alone leaves replacement characters, so the passage is rejected.
    assert!(texts(extractor.extract(&record).unwrap()).is_empty());

    record.declared_charset = Some("windows-1251".to_string());
    let records = texts(extractor.extract(&record).unwrap());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, paragraph);
}

#[test]
fn test_mixed_language_page() {
    let html = fs::read("src/extractor/tests/fixtures/czech.html")
        .expect("Failed to read test fixture");
    let record = RawRecord::response("https://zpravy.example.cz/a", http_response("text/html", &html));

    let records = texts(extractor().extract(&record).unwrap());
    let languages: Vec<&str> = records.iter().filter_map(|r| r.language()).collect();
    assert_eq!(languages, vec!["cs", "en"]);

    let config = ExtractionConfig {
        languages: vec!["cs".to_string()],
        ..ExtractionConfig::default()
    };
    let extractor = extractor_with(Arc::new(KeywordClassifier { probability: 0.999 }), config);
    let records = texts(extractor.extract(&record).unwrap());
    assert_eq!(records.len(), 1);
    assert!(records[0].text.starts_with("Praha"));
}

#[test]
fn test_page_without_paragraphs_yields_nothing() {
    let html = fs::read("src/extractor/tests/fixtures/empty.html")
        .expect("Failed to read test fixture");
    let record = RawRecord::response("https://example.com/empty", http_response("text/html", &html));

    assert!(texts(extractor().extract(&record).unwrap()).is_empty());
}

#[test]
fn test_low_confidence_and_unclassified_are_dropped() {
    let html = fs::read("src/extractor/tests/fixtures/article.html")
        .expect("Failed to read test fixture");
    let record = RawRecord::response("https://example.com/article", http_response("text/html", &html));

    let unsure = extractor_with(
        Arc::new(KeywordClassifier { probability: 0.5 }),
        ExtractionConfig::default(),
    );
    assert!(texts(unsure.extract(&record).unwrap()).is_empty());

    let silent = extractor_with(Arc::new(SilentClassifier), ExtractionConfig::default());
    assert!(texts(silent.extract(&record).unwrap()).is_empty());
}

#[test]
fn test_short_circuits() {
    let extractor = extractor();
    let html = b"<html><body><p>irrelevant</p></body></html>";

    let mut request = RawRecord::response("https://example.com/", http_response("text/html", html));
    request.record_type = RecordType::Other("request".to_string());
    assert!(matches!(
        extractor.extract(&request).unwrap(),
        Extraction::Skipped(SkipReason::NotResponse)
    ));

    let headless = RawRecord::response("https://example.com/", html.to_vec());
    assert!(matches!(
        extractor.extract(&headless).unwrap(),
        Extraction::Skipped(SkipReason::NoHeaderBoundary)
    ));

    let untyped = RawRecord::response(
        "https://example.com/",
        b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\n<p>x</p>".to_vec(),
    );
    assert!(matches!(
        extractor.extract(&untyped).unwrap(),
        Extraction::Skipped(SkipReason::NoContentType)
    ));

    let image = RawRecord::response(
        "https://example.com/logo.jpg",
        http_response("image/jpeg", &[0xFF, 0xD8, 0xFF]),
    );
    assert!(matches!(
        extractor.extract(&image).unwrap(),
        Extraction::Skipped(SkipReason::UnsupportedMimeType)
    ));
}

#[test]
fn test_invalid_target_uri_is_an_error() {
    let record = RawRecord::response("not a uri", http_response("text/html", b"<p>x</p>"));
    assert!(matches!(
        extractor().extract(&record),
        Err(ExtractError::InvalidUri { .. })
    ));

    let record = RawRecord::response("mailto:someone@example.com", http_response("text/html", b"<p>x</p>"));
    assert!(matches!(
        extractor().extract(&record),
        Err(ExtractError::MissingHost(_))
    ));
}

#[test]
fn test_whatlang_end_to_end() {
    let paragraph = "Building better software requires careful attention to design, testing and the long term maintenance of the code that teams write every single day.";
    let body = format!("<html><body><p>{paragraph}</p></body></html>");
    let record = RawRecord::response(
        "https://blog.example.com/post",
        http_response("text/html; charset=utf-8", body.as_bytes()),
    );
    let config = ExtractionConfig {
        min_confidence: 0.0,
        ..ExtractionConfig::default()
    };
    let extractor = extractor_with(Arc::new(WhatlangClassifier), config);

    let records = texts(extractor.extract(&record).unwrap());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].language(), Some("en"));
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_extract_never_panics(
            body in proptest::collection::vec(any::<u8>(), 0..2048),
            host in "[a-z]{1,12}",
        ) {
            let record = RawRecord::response(
                format!("https://{host}.com/"),
                http_response("text/html", &body),
            );
            let _ = extractor().extract(&record);
        }

        #[test]
        fn test_clean_is_idempotent(text in "\\PC*") {
            let once = crate::extractor::segmenter::clean(&text);
            prop_assert_eq!(crate::extractor::segmenter::clean(&once), once);
        }

        #[test]
        fn test_output_passes_filters(html in ".*") {
            let record = RawRecord::response(
                "https://example.com/",
                http_response("text/html", html.as_bytes()),
            );
            if let Ok(Extraction::Texts(records)) = extractor().extract(&record) {
                for record in records {
                    prop_assert!(record.text.chars().count() >= 100);
                    prop_assert!(!record.text.chars().any(|c| c.is_control()));
                }
            }
        }
    }
}
