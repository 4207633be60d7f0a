//! Command-line surface shared by the `extract` and `crawl` binaries.

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::config::{
    ConfigError, DEFAULT_CHARSETS, DEFAULT_LANGUAGES, DEFAULT_MIN_CONFIDENCE, DEFAULT_MIN_TEXT_COUNT,
    DEFAULT_MIN_TEXT_LENGTH, ENV_LANGUAGES, ExtractionConfig, SegmentMode, non_negative,
};

/// Extraction thresholds, accepted by both binaries.
#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    /// Languages to keep, in output column order
    #[arg(
        long = "language-set",
        env = ENV_LANGUAGES,
        value_delimiter = ',',
        num_args = 1..,
        default_values_t = DEFAULT_LANGUAGES.map(String::from)
    )]
    pub languages: Vec<String>,

    /// Required language identification confidence, in [0, 1]
    #[arg(long = "language-confidence", env = "WEBTEXT_LANGUAGE_CONFIDENCE", default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub min_confidence: f64,

    /// Required passage length in characters
    #[arg(
        long = "text-length",
        env = "WEBTEXT_TEXT_LENGTH",
        allow_negative_numbers = true,
        default_value_t = DEFAULT_MIN_TEXT_LENGTH as i64
    )]
    pub min_text_length: i64,

    /// Required unique passages per language for a domain to pass
    #[arg(
        long = "text-count",
        env = "WEBTEXT_TEXT_COUNT",
        allow_negative_numbers = true,
        default_value_t = DEFAULT_MIN_TEXT_COUNT as i64
    )]
    pub min_text_count: i64,

    /// Charsets tried after the declared one
    #[arg(
        long,
        env = "WEBTEXT_CHARSETS",
        value_delimiter = ',',
        num_args = 1..,
        default_values_t = DEFAULT_CHARSETS.map(String::from)
    )]
    pub charsets: Vec<String>,

    /// Which elements become candidate passages
    #[arg(long, value_enum, env = "WEBTEXT_SEGMENT_MODE", default_value_t = SegmentMode::Paragraphs)]
    pub segment_mode: SegmentMode,
}

impl ExtractionArgs {
    pub fn into_config(self) -> Result<ExtractionConfig, ConfigError> {
        let config = ExtractionConfig {
            languages: self.languages.into_iter().map(|l| l.trim().to_string()).collect(),
            min_confidence: self.min_confidence,
            min_text_length: non_negative("text-length", self.min_text_length)? as usize,
            min_text_count: non_negative("text-count", self.min_text_count)?,
            charsets: self.charsets,
            segment_mode: self.segment_mode,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
