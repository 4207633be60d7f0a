use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::pipeline::allow_set::AllowSetError;
use crate::pipeline::codec::CodecError;

/// Failures that abandon a whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot list input shards: {0}")]
    Discovery(#[from] ArchiveError),

    #[error("cannot load domain allow-set: {0}")]
    AllowSet(#[from] AllowSetError),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt shuffle partition {path}:{line}: {source}")]
    Partition {
        path: PathBuf,
        line: usize,
        #[source]
        source: CodecError,
    },

    #[error("cannot write run report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
