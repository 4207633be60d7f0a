use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::archive::shards::is_hidden;
use crate::pipeline::codec::{self, CodecError};
use crate::pipeline::fingerprint::fingerprint;
use crate::pipeline::report::SUCCESS_MARKER;

/// Failures while loading the domain side-input. Always fatal to phase 2.
#[derive(Error, Debug)]
pub enum AllowSetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed domain row: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: CodecError,
    },

    #[error("{path} has no _SUCCESS marker; the domains phase did not finish")]
    Uncommitted { path: PathBuf },
}

/// Which domains phase 2 lets through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainGate {
    /// No side-input: every domain passes.
    Open,
    /// Only domains whose fingerprint is in the set pass. An empty set
    /// passes nothing.
    AllowSet(HashSet<u64>),
}

impl DomainGate {
    pub fn admits(&self, domain: &str) -> bool {
        match self {
            DomainGate::Open => true,
            DomainGate::AllowSet(set) => set.contains(&fingerprint(domain)),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            DomainGate::Open => None,
            DomainGate::AllowSet(set) => Some(set.len()),
        }
    }
}

/// Builds the allow-set from phase-1 output: a single file or a committed
/// directory of partitions. A directory without `_SUCCESS` is refused;
/// bookkeeping files are otherwise ignored.
pub fn load(path: &Path) -> Result<DomainGate, AllowSetError> {
    let io_error = |source| AllowSetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let files = if path.is_dir() {
        if !path.join(SUCCESS_MARKER).is_file() {
            return Err(AllowSetError::Uncommitted {
                path: path.to_path_buf(),
            });
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).map_err(io_error)? {
            let entry_path = entry.map_err(io_error)?.path();
            if entry_path.is_file() && !is_hidden(&entry_path) {
                files.push(entry_path);
            }
        }
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut set = HashSet::new();
    for file in &files {
        load_file(file, &mut set)?;
    }

    info!(path = %path.display(), files = files.len(), domains = set.len(), "loaded domain allow-set");
    Ok(DomainGate::AllowSet(set))
}

fn load_file(path: &Path, set: &mut HashSet<u64>) -> Result<(), AllowSetError> {
    let io_error = |source| AllowSetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_error)?);

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.is_empty() {
            continue;
        }
        let domain = codec::domain_key(&line).map_err(|source| AllowSetError::Malformed {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        set.insert(fingerprint(&domain));
    }
    Ok(())
}
