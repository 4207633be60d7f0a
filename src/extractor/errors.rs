use thiserror::Error;

/// Record-level failures. The record is skipped and counted; the run goes on.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid target uri {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target uri {0:?} has no host")]
    MissingHost(String),

    #[error("no charset candidate could decode the document")]
    Undecodable,
}

/// Why a record produced no passages without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotResponse,
    NoHeaderBoundary,
    NoContentType,
    UnsupportedMimeType,
}
