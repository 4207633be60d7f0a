//! File-backed partitioned shuffle between the map stage and the reducers.
//!
//! Every record of a domain lands in the same partition file, so one reduce
//! task owns the whole group. Partitions are sorted by domain on disk before
//! they are reduced, so a reducer only ever holds a single group.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::extractor::TextRecord;
use crate::pipeline::codec;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::fingerprint::fingerprint;

/// Batches buffered between shard tasks and the partition writer.
const CHANNEL_CAPACITY: usize = 256;

/// Partition owning `domain`.
pub fn partition_of(domain: &str, partitions: usize) -> usize {
    (fingerprint(domain) % partitions as u64) as usize
}

pub fn partition_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("part-m-{index:05}"))
}

/// Sending half handed to shard tasks. Cheap to clone.
pub type ShuffleSender = mpsc::Sender<Vec<TextRecord>>;

/// Starts the writer owning every partition file under `dir`. The returned
/// handle resolves to the partition paths once all senders are dropped.
pub fn spawn_writer(
    dir: PathBuf,
    partitions: usize,
) -> (ShuffleSender, JoinHandle<Result<Vec<PathBuf>, PipelineError>>) {
    let (sender, mut receiver) = mpsc::channel::<Vec<TextRecord>>(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dir).map_err(PipelineError::io(&dir))?;

        let paths: Vec<PathBuf> = (0..partitions).map(|i| partition_path(&dir, i)).collect();
        let mut writers = paths
            .iter()
            .map(|path| File::create(path).map(BufWriter::new).map_err(PipelineError::io(path)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut written = 0u64;
        while let Some(batch) = receiver.blocking_recv() {
            for record in batch {
                let index = partition_of(&record.domain, partitions);
                writeln!(writers[index], "{}", codec::encode_text_record(&record))
                    .map_err(PipelineError::io(&paths[index]))?;
                written += 1;
            }
        }

        for (writer, path) in writers.iter_mut().zip(&paths) {
            writer.flush().map_err(PipelineError::io(path))?;
        }
        debug!(records = written, partitions, "shuffle written");
        Ok(paths)
    });

    (sender, handle)
}

/// Bytes of partition lines buffered before a sorted run is spilled.
pub const SORT_RUN_BYTES: usize = 32 << 20;

/// Sorted runs merged at once; more runs take several merge passes.
const MERGE_FAN_IN: usize = 64;

/// Sort key of an encoded text row: its escaped domain field. Escaping is
/// injective, so equal keys mean equal domains.
fn sort_key(line: &str) -> &str {
    line.split('\t').next().unwrap_or(line)
}

/// Sorts a partition file by domain in place, holding at most about
/// `run_bytes` of it in memory. The sort is stable: rows of one domain keep
/// their shuffle order.
pub fn sort_partition(path: &Path, run_bytes: usize) -> Result<(), PipelineError> {
    let reader = BufReader::new(File::open(path).map_err(PipelineError::io(path))?);

    let mut runs = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffered = 0usize;
    for line in reader.lines() {
        let line = line.map_err(PipelineError::io(path))?;
        buffered += line.len();
        buffer.push(line);
        if buffered >= run_bytes {
            runs.push(spill_run(path, runs.len(), &mut buffer)?);
            buffered = 0;
        }
    }
    if !buffer.is_empty() || runs.is_empty() {
        runs.push(spill_run(path, runs.len(), &mut buffer)?);
    }

    let mut generation = 0usize;
    while runs.len() > 1 {
        generation += 1;
        let mut merged = Vec::with_capacity(runs.len().div_ceil(MERGE_FAN_IN));
        for (index, chunk) in runs.chunks(MERGE_FAN_IN).enumerate() {
            let output = run_path(path, &format!("merge-{generation}-{index:05}"));
            merge_runs(chunk, &output)?;
            merged.push(output);
        }
        runs = merged;
    }

    std::fs::rename(&runs[0], path).map_err(PipelineError::io(path))?;
    debug!(path = %path.display(), merge_passes = generation, "partition sorted");
    Ok(())
}

fn run_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}

fn spill_run(path: &Path, index: usize, buffer: &mut Vec<String>) -> Result<PathBuf, PipelineError> {
    buffer.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));

    let output = run_path(path, &format!("run-{index:05}"));
    let mut writer = BufWriter::new(File::create(&output).map_err(PipelineError::io(&output))?);
    for line in buffer.drain(..) {
        writeln!(writer, "{line}").map_err(PipelineError::io(&output))?;
    }
    writer.flush().map_err(PipelineError::io(&output))?;
    Ok(output)
}

/// K-way merge of sorted runs into `output`, removing the inputs. Ties go
/// to the earlier run, which keeps the merge stable.
fn merge_runs(runs: &[PathBuf], output: &Path) -> Result<(), PipelineError> {
    let mut readers = Vec::with_capacity(runs.len());
    for run in runs {
        let file = File::open(run).map_err(PipelineError::io(run))?;
        readers.push(BufReader::new(file).lines());
    }

    let mut heap = BinaryHeap::new();
    for (index, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = reader.next() {
            let line = line.map_err(PipelineError::io(&runs[index]))?;
            heap.push(Reverse((sort_key(&line).to_string(), index, line)));
        }
    }

    let mut writer = BufWriter::new(File::create(output).map_err(PipelineError::io(output))?);
    while let Some(Reverse((_, index, line))) = heap.pop() {
        writeln!(writer, "{line}").map_err(PipelineError::io(output))?;
        if let Some(next) = readers[index].next() {
            let next = next.map_err(PipelineError::io(&runs[index]))?;
            heap.push(Reverse((sort_key(&next).to_string(), index, next)));
        }
    }
    writer.flush().map_err(PipelineError::io(output))?;

    for run in runs {
        std::fs::remove_file(run).map_err(PipelineError::io(run))?;
    }
    Ok(())
}

/// Streams the domain groups of a sorted partition, one group in memory at a
/// time.
pub struct PartitionGroups {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
    pending: Option<TextRecord>,
    failed: bool,
}

/// Opens a partition already sorted by [`sort_partition`].
pub fn groups(path: &Path) -> Result<PartitionGroups, PipelineError> {
    let file = File::open(path).map_err(PipelineError::io(path))?;
    Ok(PartitionGroups {
        path: path.to_path_buf(),
        lines: BufReader::new(file).lines(),
        line: 0,
        pending: None,
        failed: false,
    })
}

impl PartitionGroups {
    fn next_record(&mut self) -> Result<Option<TextRecord>, PipelineError> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        let line = line.map_err(PipelineError::io(&self.path))?;
        self.line += 1;
        codec::decode_text_record(&line)
            .map(Some)
            .map_err(|source| PipelineError::Partition {
                path: self.path.clone(),
                line: self.line,
                source,
            })
    }

    fn next_group(&mut self) -> Result<Option<(String, Vec<TextRecord>)>, PipelineError> {
        let first = match self.pending.take() {
            Some(record) => record,
            None => match self.next_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        let domain = first.domain.clone();
        let mut records = vec![first];
        while let Some(record) = self.next_record()? {
            if record.domain != domain {
                self.pending = Some(record);
                break;
            }
            records.push(record);
        }
        Ok(Some((domain, records)))
    }
}

impl Iterator for PartitionGroups {
    type Item = Result<(String, Vec<TextRecord>), PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let group = self.next_group().transpose();
        if matches!(group, Some(Err(_))) {
            self.failed = true;
        }
        group
    }
}
