#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use webtext::extractor::{LanguageClassifier, LanguageGuess};
use webtext::pipeline;

/// Passages mentioning Prague in Czech are `cs`, everything else `en`.
pub struct StubClassifier;

impl LanguageClassifier for StubClassifier {
    fn classify(&self, text: &str) -> Vec<LanguageGuess> {
        let language = if text.contains("Praha") { "cs" } else { "en" };
        vec![LanguageGuess {
            language: language.to_string(),
            probability: 0.999,
        }]
    }
}

pub fn english(topic: &str) -> String {
    format!(
        "This paragraph about {topic} talks at length about the many interesting things that happen in this particular place every single day."
    )
}

pub fn czech(topic: &str) -> String {
    format!(
        "Praha a {topic}: tento odstavec dlouze popisuje mnoho zajímavých věcí, které se na tomto konkrétním místě odehrávají každý den."
    )
}

pub fn html_page(paragraphs: &[String]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
    format!("<html><head><title>t</title></head><body>{body}<script>var x = 1;</script></body></html>")
}

pub fn http_response(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

pub fn warc_record(warc_type: &str, uri: &str, block: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "WARC/1.0\r\nWARC-Type: {warc_type}\r\nWARC-Target-URI: {uri}\r\nContent-Length: {}\r\n\r\n",
        block.len()
    )
    .into_bytes();
    bytes.extend_from_slice(block);
    bytes.extend_from_slice(b"\r\n\r\n");
    bytes
}

/// A `response` record holding an HTML page with the given paragraphs.
pub fn page_record(uri: &str, paragraphs: &[String]) -> Vec<u8> {
    let html = html_page(paragraphs);
    warc_record(
        "response",
        uri,
        &http_response("text/html; charset=utf-8", html.as_bytes()),
    )
}

pub fn write_shard(dir: &Path, name: &str, records: &[Vec<u8>]) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create input dir");
    let path = dir.join(name);
    fs::write(&path, records.concat()).expect("Failed to write shard");
    path
}

/// Every row of a committed phase output, sorted.
pub fn read_rows(output_dir: &Path) -> Vec<String> {
    let mut rows: Vec<String> = pipeline::output_files(output_dir)
        .expect("Failed to list output")
        .iter()
        .flat_map(|path| {
            fs::read_to_string(path)
                .expect("Failed to read output")
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    rows.sort();
    rows
}
