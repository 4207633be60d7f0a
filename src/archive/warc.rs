use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use tracing::trace;

use crate::archive::errors::ArchiveError;
use crate::extractor::{RawRecord, RecordType};

const VERSION_PREFIX: &[u8] = b"WARC/";

/// Upper bound on the buffer reserved up front for a record block. The
/// declared Content-Length is untrusted until the bytes have been read.
const MAX_PREALLOC: usize = 1 << 20;

/// Header fields of one WARC record that the pipeline cares about.
#[derive(Debug, Default)]
struct RecordHeader {
    warc_type: Option<String>,
    target_uri: Option<String>,
    content_length: Option<usize>,
}

/// Streams records out of a WARC file, plain or already decompressed.
///
/// The iterator yields `Err` once and then stops: after a malformed or
/// truncated record the rest of the stream cannot be trusted.
pub struct WarcReader<R> {
    reader: R,
    offset: u64,
    failed: bool,
}

/// Opens a shard, transparently decompressing multi-member `.gz` files.
pub fn open_shard(path: &Path) -> Result<WarcReader<Box<dyn BufRead + Send>>, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let gzipped = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    let reader: Box<dyn BufRead + Send> = if gzipped {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(WarcReader::new(reader))
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            failed: false,
        }
    }

    fn read_line(&mut self, line: &mut Vec<u8>) -> Result<usize, ArchiveError> {
        line.clear();
        let n = self.reader.read_until(b'\n', line)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, ArchiveError> {
        let mut line = Vec::new();

        // Skip the blank lines separating records
        loop {
            if self.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if !trim_eol(&line).is_empty() {
                break;
            }
        }

        let record_offset = self.offset - line.len() as u64;
        if !line.starts_with(VERSION_PREFIX) {
            return Err(ArchiveError::Malformed {
                offset: record_offset,
                reason: "missing WARC version line".to_string(),
            });
        }

        let mut header = RecordHeader::default();
        loop {
            if self.read_line(&mut line)? == 0 {
                return Err(ArchiveError::Malformed {
                    offset: record_offset,
                    reason: "header block is not terminated".to_string(),
                });
            }
            let field = trim_eol(&line);
            if field.is_empty() {
                break;
            }
            let field = String::from_utf8_lossy(field);
            let Some((name, value)) = field.split_once(':') else {
                return Err(ArchiveError::Malformed {
                    offset: record_offset,
                    reason: format!("header line without a colon: {field:?}"),
                });
            };
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "warc-type" => header.warc_type = Some(value.to_string()),
                "warc-target-uri" => {
                    header.target_uri = Some(value.trim_start_matches('<').trim_end_matches('>').to_string())
                }
                "content-length" => {
                    let length = value.parse().map_err(|_| ArchiveError::Malformed {
                        offset: record_offset,
                        reason: format!("invalid Content-Length {value:?}"),
                    })?;
                    header.content_length = Some(length);
                }
                _ => {}
            }
        }

        let expected = header.content_length.ok_or_else(|| ArchiveError::Malformed {
            offset: record_offset,
            reason: "missing Content-Length".to_string(),
        })?;
        let mut block = Vec::with_capacity(expected.min(MAX_PREALLOC));
        let actual = (&mut self.reader).take(expected as u64).read_to_end(&mut block)?;
        self.offset += actual as u64;
        if actual < expected {
            return Err(ArchiveError::Truncated {
                offset: record_offset,
                expected,
                actual,
            });
        }

        let record_type = header
            .warc_type
            .as_deref()
            .map(RecordType::from_warc_type)
            .unwrap_or_else(|| RecordType::Other(String::new()));
        trace!(offset = record_offset, ?record_type, length = expected, "read warc record");

        Ok(Some(RawRecord {
            target_uri: header.target_uri.unwrap_or_default(),
            record_type,
            raw_bytes: Bytes::from(block),
            declared_charset: None,
        }))
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<RawRecord, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
