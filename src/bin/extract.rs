use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use webtext::cli::{ExtractionArgs, init_tracing};
use webtext::config::{
    DEFAULT_PARTITIONS, ENV_DOMAINS_PATH, ENV_INPUT, ENV_STAGES, ENV_TEXTS_PATH, RunConfig, parse_stages,
};
use webtext::extractor::WhatlangClassifier;
use webtext::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "webtext-extract",
    version,
    about = "Extracts language-identified passages from WARC archives, gated by per-domain volume"
)]
struct ExtractCli {
    /// WARC files or directories holding them
    #[arg(long, env = ENV_INPUT, value_delimiter = ',', num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output directory of the domains phase; side-input of the texts phase
    #[arg(long, env = ENV_DOMAINS_PATH)]
    domains_path: Option<PathBuf>,

    /// Output directory of the texts phase
    #[arg(long, env = ENV_TEXTS_PATH)]
    texts_path: Option<PathBuf>,

    /// Phases to run: `domains`, `texts` or both
    #[arg(long, env = ENV_STAGES, default_value = "domains,texts")]
    stages: String,

    /// Scratch directory for shuffle partitions
    #[arg(long, env = "WEBTEXT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Shards processed at once; defaults to the number of CPUs
    #[arg(long, env = "WEBTEXT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Reduce partitions per phase
    #[arg(long, env = "WEBTEXT_PARTITIONS", default_value_t = DEFAULT_PARTITIONS)]
    partitions: usize,

    /// Log as JSON lines
    #[arg(long, env = "WEBTEXT_LOG_JSON", default_value_t = false)]
    log_json: bool,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

impl ExtractCli {
    fn into_run_config(self) -> Result<RunConfig> {
        let stages = parse_stages(&self.stages)?;
        let mut config = RunConfig::new(self.input, stages);
        config.domains_path = self.domains_path;
        config.texts_path = self.texts_path;
        config.work_dir = self.work_dir;
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.partitions = self.partitions;
        config.extraction = self.extraction.into_config()?;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ExtractCli::parse();
    init_tracing(cli.log_json);

    let config = cli.into_run_config().context("Invalid configuration")?;
    let pipeline = Pipeline::new(config, Arc::new(WhatlangClassifier));

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, cancelling run...");
        cancel.cancel();
    });

    let summary = pipeline.run().await.context("Run failed")?;
    for report in &summary.reports {
        info!(
            run_id = %summary.run_id,
            phase = %report.phase,
            outputs = report.reduce.outputs,
            "phase output committed"
        );
    }
    Ok(())
}
