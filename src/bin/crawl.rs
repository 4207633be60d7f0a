use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use webtext::cli::{ExtractionArgs, init_tracing};
use webtext::crawler::{CrawlConfig, Crawler};
use webtext::extractor::WhatlangClassifier;

#[derive(Parser, Debug)]
#[command(
    name = "webtext-crawl",
    version,
    about = "Crawls from seed URLs and writes language-identified passages"
)]
struct CrawlCli {
    /// File with one seed URL per line
    #[arg(long, env = "WEBTEXT_SEEDS_PATH")]
    seeds_path: PathBuf,

    /// Output file of text rows
    #[arg(long, env = "WEBTEXT_TEXTS_PATH")]
    texts_path: PathBuf,

    /// Maximum link depth from the seeds; unlimited when omitted
    #[arg(long, env = "WEBTEXT_MAX_DEPTH")]
    max_depth: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, env = "WEBTEXT_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Log as JSON lines
    #[arg(long, env = "WEBTEXT_LOG_JSON", default_value_t = false)]
    log_json: bool,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CrawlCli::parse();
    init_tracing(cli.log_json);

    let mut config = CrawlConfig::new(cli.seeds_path, cli.texts_path);
    config.max_depth = cli.max_depth;
    config.timeout = Duration::from_secs(cli.timeout_secs);
    config.extraction = cli.extraction.into_config().context("Invalid configuration")?;

    let crawler = Crawler::new(config, Arc::new(WhatlangClassifier)).context("Cannot start crawler")?;

    let cancel = crawler.cancellation_token();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, stopping crawl...");
        cancel.cancel();
    });

    let report = crawler.run().await.context("Crawl failed")?;
    info!(
        seeds = report.seeds,
        fetched = report.fetched,
        texts_written = report.texts_written,
        "crawl complete"
    );
    Ok(())
}
