use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::Stage;
use crate::pipeline::errors::PipelineError;

pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const REPORT_FILE: &str = "_REPORT.json";

/// Map-stage counters, shared by every shard task of a run.
#[derive(Debug, Default)]
pub struct Counters {
    pub shards: AtomicU64,
    pub records_read: AtomicU64,
    pub skipped_records: AtomicU64,
    pub map_outputs: AtomicU64,
    pub invalid_records: AtomicU64,
    pub invalid_files: AtomicU64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MapCounts {
        MapCounts {
            shards: self.shards.load(Ordering::Relaxed),
            records_read: self.records_read.load(Ordering::Relaxed),
            skipped_records: self.skipped_records.load(Ordering::Relaxed),
            map_outputs: self.map_outputs.load(Ordering::Relaxed),
            invalid_records: self.invalid_records.load(Ordering::Relaxed),
            invalid_files: self.invalid_files.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCounts {
    pub shards: u64,
    pub records_read: u64,
    pub skipped_records: u64,
    pub map_outputs: u64,
    pub invalid_records: u64,
    pub invalid_files: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceCounts {
    pub partitions: u64,
    pub groups: u64,
    pub outputs: u64,
}

/// Summary of one finished phase, written next to its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub run_id: Uuid,
    pub phase: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub map: MapCounts,
    pub reduce: ReduceCounts,
    /// Size of the allow-set phase 2 ran with; `None` when ungated.
    pub allowed_domains: Option<usize>,
}

impl PhaseReport {
    pub fn new(
        run_id: Uuid,
        stage: Stage,
        started_at: DateTime<Utc>,
        map: MapCounts,
        reduce: ReduceCounts,
    ) -> Self {
        Self {
            run_id,
            phase: stage.to_string(),
            started_at,
            finished_at: Utc::now(),
            map,
            reduce,
            allowed_domains: None,
        }
    }

    /// Marks `output_dir` as complete: the report first, `_SUCCESS` last.
    pub fn commit(&self, output_dir: &Path) -> Result<(), PipelineError> {
        let report_path = output_dir.join(REPORT_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&report_path, json).map_err(PipelineError::io(&report_path))?;

        let marker = output_dir.join(SUCCESS_MARKER);
        std::fs::write(&marker, b"").map_err(PipelineError::io(&marker))?;

        info!(
            phase = %self.phase,
            records_read = self.map.records_read,
            map_outputs = self.map.map_outputs,
            invalid_records = self.map.invalid_records,
            invalid_files = self.map.invalid_files,
            reduce_groups = self.reduce.groups,
            reduce_outputs = self.reduce.outputs,
            "phase completed"
        );
        Ok(())
    }

    pub fn read(output_dir: &Path) -> Result<Self, PipelineError> {
        let path = output_dir.join(REPORT_FILE);
        let bytes = std::fs::read(&path).map_err(PipelineError::io(&path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
