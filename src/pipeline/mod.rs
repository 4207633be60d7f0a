//! The two-phase extraction pipeline.
//!
//! A run maps every input shard once into a partitioned shuffle, then
//! reduces it per requested phase: `domains` aggregates per-domain
//! statistics, `texts` emits deduplicated passages of the domains phase 1
//! accepted. Phase 1 is committed before the allow-set is loaded.

pub mod aggregate;
pub mod allow_set;
pub mod codec;
pub mod errors;
pub mod filter;
pub mod fingerprint;
pub mod report;
pub mod shuffle;
pub mod worker;

pub use aggregate::{DomainAggregator, DomainStatsBuilder};
pub use allow_set::{AllowSetError, DomainGate};
pub use errors::PipelineError;
pub use filter::TextFilter;
pub use report::PhaseReport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive;
use crate::config::{RunConfig, Stage};
use crate::extractor::{Extractor, LanguageClassifier, TextRecord};
use report::Counters;

/// Reduce side of a phase: turns one domain group into output rows.
pub trait GroupReducer: Send {
    fn name(&self) -> &'static str;

    fn reduce(&mut self, domain: &str, records: &[TextRecord]) -> Vec<String>;
}

/// Reports of every phase a run completed, in execution order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reports: Vec<PhaseReport>,
}

impl RunSummary {
    pub fn phase(&self, stage: Stage) -> Option<&PhaseReport> {
        let name = stage.to_string();
        self.reports.iter().find(|r| r.phase == name)
    }
}

pub struct Pipeline {
    config: RunConfig,
    classifier: Arc<dyn LanguageClassifier>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: RunConfig, classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self {
            config,
            classifier,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops a running pipeline when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.config.validate()?;
        let extractor = Arc::new(Extractor::new(
            self.config.extraction.clone(),
            self.classifier.clone(),
        )?);

        let run_id = Uuid::new_v4();
        let shuffle_dir = self
            .config
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("webtext-shuffle-{run_id}"));

        info!(%run_id, stages = ?self.config.stages, "starting run");
        let result = self.run_phases(run_id, extractor, &shuffle_dir).await;

        if let Err(e) = std::fs::remove_dir_all(&shuffle_dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %shuffle_dir.display(), error = %e, "cannot remove shuffle directory");
        }
        result
    }

    async fn run_phases(
        &self,
        run_id: Uuid,
        extractor: Arc<Extractor>,
        shuffle_dir: &Path,
    ) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        let started_at = Utc::now();

        let inputs = config.inputs.clone();
        let shards = tokio::task::spawn_blocking(move || archive::discover(&inputs)).await??;

        // Both phases group the same extracted stream by domain, so it is
        // extracted once and the partitions are reused.
        let counters = Arc::new(Counters::default());
        let partitions = worker::run_map_stage(
            shards,
            extractor,
            shuffle_dir.to_path_buf(),
            config.partitions,
            config.concurrency,
            counters.clone(),
            self.cancel.clone(),
        )
        .await?;
        let map_counts = counters.snapshot();

        let mut reports = Vec::new();

        if let Some(domains_path) = config.domains_path.as_deref().filter(|_| config.has_stage(Stage::Domains)) {
            let aggregator = DomainAggregator::new(&config.extraction);
            let reduce = worker::run_reduce_stage(
                &partitions,
                aggregator,
                domains_path,
                config.concurrency,
                self.cancel.clone(),
            )
            .await?;
            let report = PhaseReport::new(run_id, Stage::Domains, started_at, map_counts, reduce);
            report.commit(domains_path)?;
            reports.push(report);
        }

        if let Some(texts_path) = config.texts_path.as_deref().filter(|_| config.has_stage(Stage::Texts)) {
            let phase_started = Utc::now();
            let gate = Arc::new(self.load_gate().await?);
            let filter = TextFilter::new(gate.clone());
            let reduce = worker::run_reduce_stage(
                &partitions,
                filter,
                texts_path,
                config.concurrency,
                self.cancel.clone(),
            )
            .await?;
            let mut report = PhaseReport::new(run_id, Stage::Texts, phase_started, map_counts, reduce);
            report.allowed_domains = gate.len();
            report.commit(texts_path)?;
            reports.push(report);
        }

        Ok(RunSummary { run_id, reports })
    }

    /// The side-input is phase 1's committed output when phase 1 ran,
    /// otherwise whatever `domains_path` names. Without one, nothing is gated.
    async fn load_gate(&self) -> Result<DomainGate, PipelineError> {
        let Some(path) = self.config.domains_path.clone() else {
            info!("no domain side-input, texts phase is ungated");
            return Ok(DomainGate::Open);
        };
        let gate = tokio::task::spawn_blocking(move || allow_set::load(&path)).await??;
        Ok(gate)
    }
}

/// Row files of a committed phase output, in partition order.
pub fn output_files(output_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(output_dir).map_err(PipelineError::io(output_dir))? {
        let path = entry.map_err(PipelineError::io(output_dir))?.path();
        if path.is_file() && !archive::shards::is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
