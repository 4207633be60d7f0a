use regex::Regex;
use std::sync::LazyLock;

static CONTENT_TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^content-type:[ \t]*([^\r\n]*)").unwrap());

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static CHARSET_CLEANER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w-]").unwrap());

const HEADER_BOUNDARY: &[u8] = b"\r\n\r\n";

/// MIME types handed to the HTML pipeline.
pub const SUPPORTED_MIME_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Splits an HTTP response into its header block and body at the first blank
/// line. `None` when the response has no header boundary.
pub fn split_response(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes
        .windows(HEADER_BOUNDARY.len())
        .position(|window| window == HEADER_BOUNDARY)?;
    Some((&bytes[..pos], &bytes[pos + HEADER_BOUNDARY.len()..]))
}

/// Value of the `Content-Type` header, trimmed and lower-cased.
pub fn content_type(header: &str) -> Option<String> {
    let captures = CONTENT_TYPE_REGEX.captures(header)?;
    let value = captures.get(1)?.as_str().trim().to_lowercase();
    Some(value)
}

/// MIME type part of a content type (`text/html; charset=x` → `text/html`).
pub fn mime_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_lowercase();
    if mime.is_empty() {
        return None;
    }
    Some(mime)
}

/// Charset parameter of a content type, stripped of anything but word
/// characters and dashes.
pub fn charset(content_type: &str) -> Option<String> {
    let captures = CHARSET_REGEX.captures(content_type)?;
    let raw = captures.get(1)?.as_str().to_lowercase();
    let cleaned = CHARSET_CLEANER.replace_all(&raw, "").into_owned();
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned)
}

pub fn is_supported_mime_type(mime: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nServer: test\r\nContent-TYPE: Text/HTML; Charset=\"ISO-8859-1\"\r\n\r\n<html></html>";

    #[test]
    fn splits_header_from_body() {
        let (header, body) = split_response(RESPONSE).unwrap();
        assert!(header.starts_with(b"HTTP/1.1 200 OK"));
        assert_eq!(body, b"<html></html>");
        assert!(split_response(b"HTTP/1.1 200 OK\r\nno boundary").is_none());
    }

    #[test]
    fn parses_content_type_case_insensitively() {
        let (header, _) = split_response(RESPONSE).unwrap();
        let header = String::from_utf8_lossy(header);
        let content_type = content_type(&header).unwrap();
        assert_eq!(content_type, "text/html; charset=\"iso-8859-1\"");
        assert_eq!(mime_type(&content_type).as_deref(), Some("text/html"));
        assert_eq!(charset(&content_type).as_deref(), Some("iso-8859-1"));
    }

    #[test]
    fn missing_content_type_or_charset() {
        assert!(content_type("HTTP/1.1 200 OK\r\nServer: x").is_none());
        assert_eq!(charset("text/html"), None);
        assert_eq!(charset("text/html; charset=utf-8;").as_deref(), Some("utf-8"));
        assert_eq!(mime_type("  ; charset=utf-8"), None);
    }

    #[test]
    fn only_html_is_supported() {
        assert!(is_supported_mime_type("text/html"));
        assert!(is_supported_mime_type("application/xhtml+xml"));
        assert!(!is_supported_mime_type("image/jpeg"));
        assert!(!is_supported_mime_type("text/plain"));
    }
}
