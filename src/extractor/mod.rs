pub mod charset;
pub mod cleaner;
pub mod errors;
pub mod http;
pub mod language;
pub mod model;
pub mod segmenter;

#[cfg(test)]
mod tests;

pub use errors::{ExtractError, SkipReason};
pub use language::{LanguageClassifier, LanguageGuess, WhatlangClassifier};
pub use model::{Classification, DomainStats, LanguageStats, RawRecord, RecordType, TextRecord};

use scraper::Html;
use std::sync::Arc;
use url::Url;

use crate::config::{ConfigError, ExtractionConfig};
use charset::CharsetResolver;

/// Charset assumed when the transport declares none, or one we cannot decode.
const DEFAULT_CHARSET: &str = "UTF-8";

/// Result of running one record through the extractor.
#[derive(Debug)]
pub enum Extraction {
    /// The record carries no HTML page.
    Skipped(SkipReason),
    /// Accepted passages; possibly empty.
    Texts(Vec<TextRecord>),
}

/// Turns archived HTTP responses into classified, filtered passages.
pub struct Extractor {
    config: ExtractionConfig,
    resolver: CharsetResolver,
    classifier: Arc<dyn LanguageClassifier>,
}

impl Extractor {
    pub fn new(
        config: ExtractionConfig,
        classifier: Arc<dyn LanguageClassifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = CharsetResolver::new(&config.charsets)?;
        Ok(Self {
            config,
            resolver,
            classifier,
        })
    }

    /// Replaces the charset resolver built from the configuration.
    pub fn with_resolver(mut self, resolver: CharsetResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract(&self, record: &RawRecord) -> Result<Extraction, ExtractError> {
        // 1. Only responses carry pages
        if record.record_type != RecordType::Response {
            return Ok(Extraction::Skipped(SkipReason::NotResponse));
        }
        let domain = parse_domain(&record.target_uri)?;

        // 2. Locate the HTTP header and check the content type
        let Some((header, body)) = http::split_response(&record.raw_bytes) else {
            return Ok(Extraction::Skipped(SkipReason::NoHeaderBoundary));
        };
        let header = String::from_utf8_lossy(header);
        let Some(content_type) = http::content_type(&header) else {
            return Ok(Extraction::Skipped(SkipReason::NoContentType));
        };
        let is_html = http::mime_type(&content_type).is_some_and(|mime| http::is_supported_mime_type(&mime));
        if !is_html {
            return Ok(Extraction::Skipped(SkipReason::UnsupportedMimeType));
        }

        // 3. Decode with the best charset and sanitize
        let hint = record
            .declared_charset
            .clone()
            .or_else(|| http::charset(&content_type));
        let base_url = Url::parse(&record.target_uri).ok();
        let document = self
            .decode(body, hint.as_deref(), base_url.as_ref())
            .ok_or(ExtractError::Undecodable)?;

        // 4. Segment, classify and filter
        Ok(Extraction::Texts(self.texts(
            &domain,
            &record.target_uri,
            &document,
        )))
    }

    /// Resolves the charset of `body` and returns the sanitized document.
    pub fn decode(&self, body: &[u8], hint: Option<&str>, base_url: Option<&Url>) -> Option<Html> {
        let hint = hint
            .filter(|label| charset::lookup(label).is_some())
            .unwrap_or(DEFAULT_CHARSET);
        let resolved = self.resolver.resolve(body, Some(hint))?;
        Some(cleaner::sanitize(&resolved.document, base_url))
    }

    /// Accepted passages of a sanitized document.
    pub fn texts(&self, domain: &str, uri: &str, document: &Html) -> Vec<TextRecord> {
        segmenter::segment(document, self.config.segment_mode)
            .iter()
            .map(|raw| segmenter::clean(raw))
            .filter(|text| segmenter::passes_shape_filter(text, self.config.min_text_length))
            .map(|text| TextRecord {
                domain: domain.to_string(),
                uri: uri.to_string(),
                classification: language::top_classification(self.classifier.as_ref(), &text),
                text,
            })
            .filter(|record| self.accepts(record))
            .collect()
    }

    /// Language and confidence gate applied to every classified passage.
    pub fn accepts(&self, record: &TextRecord) -> bool {
        match &record.classification {
            None => false,
            Some(c) => self.config.has_language(&c.language) && c.confidence >= self.config.min_confidence,
        }
    }
}

/// Host component of a URI, the grouping key of both phases.
pub fn parse_domain(uri: &str) -> Result<String, ExtractError> {
    let url = Url::parse(uri).map_err(|source| ExtractError::InvalidUri {
        uri: uri.to_string(),
        source,
    })?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| ExtractError::MissingHost(uri.to_string()))
}
