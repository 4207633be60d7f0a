use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, ClientBuilder, header};
use tracing::{debug, instrument};
use url::Url;

use crate::extractor::http;
use crate::fetcher::{errors::FetchError, types::PageResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB
const USER_AGENT: &str = concat!("webtext/", env!("CARGO_PKG_VERSION"));

/// HTTP client of the crawler. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        let client = ClientBuilder::new()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError> {
        let parsed_url = Url::parse(url)?;

        let response = self
            .client
            .get(parsed_url)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Check content length before downloading
        if let Some(content_length) = response.content_length()
            && content_length > MAX_BODY_SIZE
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let url_final = response.url().clone();
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        let is_html = http::mime_type(&content_type).is_some_and(|mime| http::is_supported_mime_type(&mime));
        if !is_html {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        // Content-Length may have been missing
        if body.len() as u64 > MAX_BODY_SIZE {
            return Err(FetchError::BodyTooLarge(body.len() as u64));
        }

        debug!(status = status.as_u16(), bytes = body.len(), "page fetched");
        Ok(PageResponse {
            url_final,
            status,
            declared_charset: http::charset(&content_type),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }
}
