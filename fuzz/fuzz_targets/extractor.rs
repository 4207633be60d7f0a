#![no_main]

use std::io::Cursor;
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use webtext::archive::WarcReader;
use webtext::config::ExtractionConfig;
use webtext::extractor::{Extractor, RawRecord, WhatlangClassifier};

fuzz_target!(|data: &[u8]| {
    let extractor = Extractor::new(ExtractionConfig::default(), Arc::new(WhatlangClassifier))
        .expect("default configuration is valid");

    // Arbitrary bytes as an HTTP response: extraction must never panic
    let record = RawRecord::response("https://example.com/", data.to_vec());
    let _ = extractor.extract(&record);

    // ... and as a WARC stream: the reader must end or fail cleanly
    for record in WarcReader::new(Cursor::new(data)) {
        match record {
            Ok(record) => {
                let _ = extractor.extract(&record);
            }
            Err(_) => break,
        }
    }
});
