//! Run configuration for the extraction pipeline and the crawler.
//!
//! Everything here is read-only once a run starts. `ExtractionConfig` holds
//! the thresholds shared by every component that turns pages into text
//! records; `RunConfig` adds the paths and parallelism of a pipeline run.
//! Both are validated eagerly so that a bad value aborts the run before any
//! input is touched.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Environment variable names accepted by the binaries in addition to flags.
pub const ENV_INPUT: &str = "WEBTEXT_INPUT";
pub const ENV_DOMAINS_PATH: &str = "WEBTEXT_DOMAINS_PATH";
pub const ENV_TEXTS_PATH: &str = "WEBTEXT_TEXTS_PATH";
pub const ENV_STAGES: &str = "WEBTEXT_STAGES";
pub const ENV_LANGUAGES: &str = "WEBTEXT_LANGUAGES";

pub const DEFAULT_LANGUAGES: [&str; 2] = ["en", "cs"];
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.99;
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 100;
pub const DEFAULT_MIN_TEXT_COUNT: u64 = 1;
pub const DEFAULT_CHARSETS: [&str; 5] = ["UTF-8", "ISO-8859-1", "GB2312", "CP1251", "CP1252"];
pub const DEFAULT_PARTITIONS: usize = 24;

/// Errors that can occur while building or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown stage '{0}' (expected 'domains' or 'texts')")]
    UnknownStage(String),

    #[error("unknown charset '{0}'")]
    UnknownCharset(String),

    #[error("'{0}' is required by the requested stages")]
    MissingPath(&'static str),

    #[error("output path {0} already exists")]
    OutputExists(PathBuf),
}

/// How candidate passages are selected from a sanitized document body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SegmentMode {
    /// Text of every `p` element.
    #[default]
    Paragraphs,
    /// Full text of every element that carries text of its own.
    OwnText,
}

/// Thresholds and charset plan shared by the record extractor and the crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Accepted language codes, in the order they are written to domain rows.
    pub languages: Vec<String>,
    pub min_confidence: f64,
    /// Minimum passage length in characters.
    pub min_text_length: usize,
    /// Minimum unique passages per configured language for a domain to pass.
    pub min_text_count: u64,
    /// Charsets tried after the declared one, in order.
    pub charsets: Vec<String>,
    pub segment_mode: SegmentMode,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
            min_text_count: DEFAULT_MIN_TEXT_COUNT,
            charsets: DEFAULT_CHARSETS.iter().map(|c| c.to_string()).collect(),
            segment_mode: SegmentMode::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn has_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "languages",
                reason: "at least one language is required".to_string(),
            });
        }
        if let Some(blank) = self.languages.iter().find(|l| l.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "languages",
                reason: format!("blank language code {blank:?}"),
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "min_confidence",
                reason: format!("{} is outside [0, 1]", self.min_confidence),
            });
        }
        for label in &self.charsets {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                return Err(ConfigError::UnknownCharset(label.clone()));
            }
        }
        Ok(())
    }
}

/// Converts a signed command-line threshold, rejecting negative values.
pub fn non_negative(field: &'static str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("{value} is negative"),
    })
}

/// One of the two pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Phase 1: per-domain statistics and acceptance.
    Domains,
    /// Phase 2: text output gated by the accepted domains.
    Texts,
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "domains" => Ok(Self::Domains),
            "texts" => Ok(Self::Texts),
            other => Err(ConfigError::UnknownStage(other.to_string())),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Domains => write!(f, "domains"),
            Stage::Texts => write!(f, "texts"),
        }
    }
}

/// Full configuration of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input files or directories holding WARC shards.
    pub inputs: Vec<PathBuf>,
    /// Phase-1 output; also the side-input of phase 2 when present.
    pub domains_path: Option<PathBuf>,
    pub texts_path: Option<PathBuf>,
    /// Requested phases, always executed domains-first.
    pub stages: Vec<Stage>,
    /// Scratch directory for shuffle partitions. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Number of shards processed at once.
    pub concurrency: usize,
    /// Number of key partitions, i.e. reduce tasks per phase.
    pub partitions: usize,
    pub extraction: ExtractionConfig,
}

impl RunConfig {
    pub fn new(inputs: Vec<PathBuf>, stages: Vec<Stage>) -> Self {
        Self {
            inputs,
            domains_path: None,
            texts_path: None,
            stages,
            work_dir: None,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            partitions: DEFAULT_PARTITIONS,
            extraction: ExtractionConfig::default(),
        }
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Checks every value a run depends on. Called before any processing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;

        if self.inputs.is_empty() {
            return Err(ConfigError::MissingPath("input"));
        }
        if self.stages.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "stages",
                reason: "no stage requested".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.partitions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "partitions",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.has_stage(Stage::Domains) {
            let path = self
                .domains_path
                .as_deref()
                .ok_or(ConfigError::MissingPath("domains_path"))?;
            ensure_fresh_output(path)?;
        }
        if self.has_stage(Stage::Texts) {
            let path = self
                .texts_path
                .as_deref()
                .ok_or(ConfigError::MissingPath("texts_path"))?;
            ensure_fresh_output(path)?;
        }
        Ok(())
    }
}

/// Parses a comma or whitespace separated stage list, e.g. `domains,texts`.
pub fn parse_stages(value: &str) -> Result<Vec<Stage>, ConfigError> {
    let mut stages = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(Stage::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    stages.sort();
    stages.dedup();
    Ok(stages)
}

fn ensure_fresh_output(path: &Path) -> Result<(), ConfigError> {
    let occupied = match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => path.exists(),
    };
    if occupied {
        return Err(ConfigError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}
