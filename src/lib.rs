pub mod archive;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod extractor;
pub mod fetcher;
pub mod pipeline;
