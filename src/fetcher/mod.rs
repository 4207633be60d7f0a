pub mod client;
pub mod errors;
pub mod types;

pub use client::{DEFAULT_TIMEOUT, Fetcher};
pub use errors::FetchError;
pub use types::PageResponse;
