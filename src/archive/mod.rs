//! Reading crawled pages out of WARC shards.

pub mod errors;
pub mod shards;
pub mod warc;

pub use errors::ArchiveError;
pub use shards::discover;
pub use warc::{WarcReader, open_shard};
