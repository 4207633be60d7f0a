use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::archive::errors::ArchiveError;

/// Hidden files and job bookkeeping such as `_SUCCESS` are never inputs.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') || name.starts_with('_'))
}

/// Expands input paths into the sorted list of shard files they hold.
/// Directories are walked recursively.
pub fn discover(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut shards = Vec::new();
    for input in inputs {
        for entry in WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| input.clone());
                ArchiveError::Open {
                    path,
                    source: e.into(),
                }
            })?;
            if entry.file_type().is_file() {
                shards.push(entry.into_path());
            }
        }
    }
    shards.sort();
    shards.dedup();
    debug!(count = shards.len(), "discovered input shards");
    Ok(shards)
}
