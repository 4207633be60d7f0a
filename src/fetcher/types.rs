use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use url::Url;

/// A fetched HTML page, body still undecoded.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// URL after redirects.
    pub url_final: Url,
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
    /// `charset` parameter of the `Content-Type` header, if any.
    pub declared_charset: Option<String>,
    pub fetched_at: DateTime<Utc>,
}
