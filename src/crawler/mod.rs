//! Breadth-first crawler producing text rows without the batch pipeline.
//!
//! A single sequential frontier: every queued URL is fetched once with a
//! fixed timeout and never retried. Passages are deduplicated across the
//! whole crawl and written in the same row format as the texts phase.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use crate::config::{ConfigError, ExtractionConfig};
use crate::extractor::{Extractor, LanguageClassifier, TextRecord, parse_domain};
use crate::fetcher::{DEFAULT_TIMEOUT, FetchError, Fetcher, PageResponse};
use crate::pipeline::codec;
use crate::pipeline::fingerprint::FingerprintSet;

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot read seeds file {path}: {source}")]
    Seeds {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write texts file {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create http client: {0}")]
    Client(#[from] FetchError),

    #[error("crawl cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// One seed URL per line.
    pub seeds_path: PathBuf,
    pub texts_path: PathBuf,
    /// Links are followed up to this depth; seeds are depth 0. `None` means
    /// no limit.
    pub max_depth: Option<u32>,
    pub timeout: Duration,
    pub extraction: ExtractionConfig,
}

impl CrawlConfig {
    pub fn new(seeds_path: impl Into<PathBuf>, texts_path: impl Into<PathBuf>) -> Self {
        Self {
            seeds_path: seeds_path.into(),
            texts_path: texts_path.into(),
            max_depth: None,
            timeout: DEFAULT_TIMEOUT,
            extraction: ExtractionConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;
        if self.texts_path.exists() {
            return Err(ConfigError::OutputExists(self.texts_path.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub seeds: u64,
    pub fetched: u64,
    pub failed_fetches: u64,
    pub invalid_uris: u64,
    pub texts_written: u64,
    pub duplicate_texts: u64,
    /// Distinct URIs ever put on the frontier, seeds included.
    pub enqueued: u64,
}

#[derive(Debug)]
struct QueueItem {
    uri: String,
    depth: u32,
}

/// What one fetched page contributes to the crawl.
struct PageContent {
    texts: Vec<TextRecord>,
    links: Vec<String>,
}

pub struct Crawler {
    config: CrawlConfig,
    extractor: Extractor,
    fetcher: Fetcher,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(config: CrawlConfig, classifier: Arc<dyn LanguageClassifier>) -> Result<Self, CrawlError> {
        config.validate()?;
        let extractor = Extractor::new(config.extraction.clone(), classifier)?;
        let fetcher = Fetcher::new(config.timeout)?;
        Ok(Self {
            config,
            extractor,
            fetcher,
            cancel: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        let seeds = self.read_seeds().await?;
        let mut report = CrawlReport {
            seeds: seeds.len() as u64,
            ..CrawlReport::default()
        };
        info!(seeds = report.seeds, max_depth = ?self.config.max_depth, "starting crawl");

        let texts_path = &self.config.texts_path;
        let output_error = |source| CrawlError::Output {
            path: texts_path.clone(),
            source,
        };
        let file = tokio::fs::File::create(texts_path).await.map_err(output_error)?;
        let mut writer = BufWriter::new(file);

        // A URI is marked seen when queued, so the frontier never holds it twice.
        let mut seen_uris = FingerprintSet::new();
        let mut seen_texts = FingerprintSet::new();
        let mut frontier = VecDeque::new();
        for uri in seeds {
            if seen_uris.insert(&uri) {
                frontier.push_back(QueueItem { uri, depth: 0 });
                report.enqueued += 1;
            }
        }

        while let Some(item) = frontier.pop_front() {
            if self.cancel.is_cancelled() {
                writer.flush().await.map_err(output_error)?;
                return Err(CrawlError::Cancelled);
            }

            let domain = match parse_domain(&item.uri) {
                Ok(domain) => domain,
                Err(e) => {
                    warn!(uri = %item.uri, error = %e, "invalid queue item");
                    report.invalid_uris += 1;
                    continue;
                }
            };

            let span = info_span!("crawl_item", uri = %item.uri, depth = item.depth);
            let page = match self.fetcher.fetch(&item.uri).instrument(span.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(parent: &span, error = %e, "fetch failed");
                    report.failed_fetches += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let content = self.page_content(&domain, &item.uri, &page);
            for text in &content.texts {
                if !seen_texts.insert(&text.text) {
                    report.duplicate_texts += 1;
                    continue;
                }
                let line = codec::encode_text_record(text) + "\n";
                writer.write_all(line.as_bytes()).await.map_err(output_error)?;
                report.texts_written += 1;
            }

            if self.config.max_depth.is_some_and(|max| item.depth >= max) {
                continue;
            }
            for link in content.links {
                if link.contains('#') {
                    continue;
                }
                let same_domain = parse_domain(&link).is_ok_and(|link_domain| link_domain == domain);
                if same_domain && seen_uris.insert(&link) {
                    frontier.push_back(QueueItem {
                        uri: link,
                        depth: item.depth + 1,
                    });
                    report.enqueued += 1;
                }
            }
        }

        writer.flush().await.map_err(output_error)?;
        info!(
            fetched = report.fetched,
            failed_fetches = report.failed_fetches,
            texts_written = report.texts_written,
            "crawl finished"
        );
        Ok(report)
    }

    async fn read_seeds(&self) -> Result<Vec<String>, CrawlError> {
        let path = &self.config.seeds_path;
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CrawlError::Seeds {
                path: path.clone(),
                source,
            })?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Accepted passages and outgoing absolute links of a fetched page.
    fn page_content(&self, domain: &str, uri: &str, page: &PageResponse) -> PageContent {
        let Some(document) =
            self.extractor
                .decode(&page.body, page.declared_charset.as_deref(), Some(&page.url_final))
        else {
            debug!(uri, "page could not be decoded");
            return PageContent {
                texts: Vec::new(),
                links: Vec::new(),
            };
        };

        PageContent {
            texts: self.extractor.texts(domain, uri, &document),
            links: links(&document, &page.url_final),
        }
    }
}

fn links(document: &Html, base: &Url) -> Vec<String> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect()
}
