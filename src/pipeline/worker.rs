//! Worker pool for the map and reduce stages.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::archive::{ArchiveError, open_shard};
use crate::extractor::{Extraction, Extractor};
use crate::pipeline::GroupReducer;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::report::{Counters, ReduceCounts};
use crate::pipeline::shuffle::{self, ShuffleSender};

/// Extracts every shard into the shuffle under `shuffle_dir`. Shard and
/// record failures are counted, never returned.
pub async fn run_map_stage(
    shards: Vec<PathBuf>,
    extractor: Arc<Extractor>,
    shuffle_dir: PathBuf,
    partitions: usize,
    concurrency: usize,
    counters: Arc<Counters>,
    cancel: CancellationToken,
) -> Result<Vec<PathBuf>, PipelineError> {
    info!(shards = shards.len(), concurrency, partitions, "starting map stage");

    let (sender, writer) = shuffle::spawn_writer(shuffle_dir, partitions);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for shard in shards {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => permit.map_err(|_| PipelineError::Cancelled)?,
        };
        let extractor = extractor.clone();
        let sender = sender.clone();
        let counters = counters.clone();
        let cancel = cancel.clone();

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let span = info_span!("shard", path = %shard.display());
            let _guard = span.enter();

            Counters::incr(&counters.shards);
            if let Err(e) = process_shard(&shard, &extractor, &sender, &counters, &cancel) {
                error!(error = %e, "abandoning shard");
                Counters::incr(&counters.invalid_files);
            }
        });
    }
    drop(sender);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "shard task panicked");
            Counters::incr(&counters.invalid_files);
        }
    }

    let paths = writer.await??;
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    sort_partitions(&paths, concurrency, &cancel).await?;

    let counts = counters.snapshot();
    info!(
        records_read = counts.records_read,
        map_outputs = counts.map_outputs,
        invalid_records = counts.invalid_records,
        invalid_files = counts.invalid_files,
        "map stage finished"
    );
    Ok(paths)
}

/// Sorts every partition by domain so reducers can stream their groups.
async fn sort_partitions(
    paths: &[PathBuf],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for path in paths {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            permit = semaphore.clone().acquire_owned() => permit.map_err(|_| PipelineError::Cancelled)?,
        };
        let path = path.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            shuffle::sort_partition(&path, shuffle::SORT_RUN_BYTES)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    Ok(())
}

fn process_shard(
    path: &Path,
    extractor: &Extractor,
    sender: &ShuffleSender,
    counters: &Counters,
    cancel: &CancellationToken,
) -> Result<(), ArchiveError> {
    debug!("reading shard");
    for record in open_shard(path)? {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let record = record?;
        Counters::incr(&counters.records_read);

        let extraction = catch_unwind(AssertUnwindSafe(|| extractor.extract(&record)));
        match extraction {
            Ok(Ok(Extraction::Skipped(reason))) => {
                debug!(uri = %record.target_uri, ?reason, "record skipped");
                Counters::incr(&counters.skipped_records);
            }
            Ok(Ok(Extraction::Texts(texts))) => {
                if texts.is_empty() {
                    continue;
                }
                Counters::add(&counters.map_outputs, texts.len() as u64);
                if sender.blocking_send(texts).is_err() {
                    // The writer failed; its error is reported by the stage.
                    return Ok(());
                }
            }
            Ok(Err(e)) => {
                warn!(uri = %record.target_uri, error = %e, "invalid record");
                Counters::incr(&counters.invalid_records);
            }
            Err(_) => {
                warn!(uri = %record.target_uri, "extractor panicked on record");
                Counters::incr(&counters.invalid_records);
            }
        }
    }
    Ok(())
}

/// Runs `reducer` over every shuffle partition, writing one
/// `part-r-NNNNN` file per partition under `output_dir`.
pub async fn run_reduce_stage<R>(
    partitions: &[PathBuf],
    reducer: R,
    output_dir: &Path,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<ReduceCounts, PipelineError>
where
    R: GroupReducer + Clone + 'static,
{
    info!(reducer = reducer.name(), partitions = partitions.len(), "starting reduce stage");
    std::fs::create_dir_all(output_dir).map_err(PipelineError::io(output_dir))?;

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for (index, input) in partitions.iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            permit = semaphore.clone().acquire_owned() => permit.map_err(|_| PipelineError::Cancelled)?,
        };
        let input = input.clone();
        let output = output_dir.join(format!("part-r-{index:05}"));
        let reducer = reducer.clone();

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let span = info_span!("partition", index);
            let _guard = span.enter();
            reduce_partition(&input, &output, reducer)
        });
    }

    let mut counts = ReduceCounts::default();
    while let Some(joined) = tasks.join_next().await {
        let (groups, outputs) = joined??;
        counts.partitions += 1;
        counts.groups += groups;
        counts.outputs += outputs;
    }
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    info!(groups = counts.groups, outputs = counts.outputs, "reduce stage finished");
    Ok(counts)
}

fn reduce_partition<R: GroupReducer>(
    input: &Path,
    output: &Path,
    mut reducer: R,
) -> Result<(u64, u64), PipelineError> {
    let mut writer = BufWriter::new(File::create(output).map_err(PipelineError::io(output))?);

    let mut groups = 0u64;
    let mut outputs = 0u64;
    for group in shuffle::groups(input)? {
        let (domain, records) = group?;
        groups += 1;
        for row in reducer.reduce(&domain, &records) {
            writeln!(writer, "{row}").map_err(PipelineError::io(output))?;
            outputs += 1;
        }
    }

    let file = writer
        .into_inner()
        .map_err(|e| PipelineError::Io {
            path: output.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(PipelineError::io(output))?;

    debug!(groups, outputs, "partition reduced");
    Ok((groups, outputs))
}
