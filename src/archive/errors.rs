use std::path::PathBuf;

use thiserror::Error;

/// Shard-level failures. The shard is abandoned; sibling shards go on.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("record at offset {offset} is truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        offset: u64,
        expected: usize,
        actual: usize,
    },
}
