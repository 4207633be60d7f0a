use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Archive record kind. Only HTTP responses carry pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Response,
    Other(String),
}

impl RecordType {
    pub fn from_warc_type(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("response") {
            Self::Response
        } else {
            Self::Other(value.trim().to_string())
        }
    }
}

/// One crawled page as handed over by the archive reader.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub target_uri: String,
    pub record_type: RecordType,
    /// HTTP response, header block included.
    pub raw_bytes: Bytes,
    /// Charset declared by the transport, when the reader already knows it.
    /// Takes precedence over the `Content-Type` header inside `raw_bytes`.
    pub declared_charset: Option<String>,
}

impl RawRecord {
    pub fn response(target_uri: impl Into<String>, raw_bytes: impl Into<Bytes>) -> Self {
        Self {
            target_uri: target_uri.into(),
            record_type: RecordType::Response,
            raw_bytes: raw_bytes.into(),
            declared_charset: None,
        }
    }
}

/// Top language guess for a passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub language: String,
    pub confidence: f64,
}

/// One candidate passage. `classification` is `None` when language
/// identification produced no result; such records never reach output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub domain: String,
    pub uri: String,
    pub classification: Option<Classification>,
    pub text: String,
}

impl TextRecord {
    pub fn language(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.language.as_str())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.classification.as_ref().map(|c| c.confidence)
    }

    /// Passage length in characters.
    pub fn text_length(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

/// Per-language totals of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub language: String,
    pub unique_text_count: u64,
    pub total_text_length: u64,
}

/// Finalized phase-1 statistics of one domain. Languages follow the
/// configured order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub unique_uri_count: u64,
    pub languages: Vec<LanguageStats>,
}

impl DomainStats {
    pub fn language(&self, language: &str) -> Option<&LanguageStats> {
        self.languages.iter().find(|l| l.language == language)
    }

    pub fn text_count(&self, language: &str) -> u64 {
        self.language(language).map_or(0, |l| l.unique_text_count)
    }
}
