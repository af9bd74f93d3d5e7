//! `data:` URI encoding and parsing (base64 form only).

use crate::error::{PreviewError, Result};
use base64::{engine::general_purpose, Engine as _};

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Media type without parameters, lowercased. Empty media types are
    /// reported as `text/plain` per RFC 2397.
    pub mime_type: String,
    /// Decoded payload.
    pub bytes: Vec<u8>,
}

/// Encode bytes as `data:<mime>;base64,<payload>`.
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    let payload = general_purpose::STANDARD.encode(bytes);
    format!("{SCHEME}{mime_type}{BASE64_MARKER},{payload}")
}

/// Whether a locator looks like a data URI.
pub fn is_data_uri(locator: &str) -> bool {
    locator
        .trim_start()
        .get(..SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME))
}

/// Parse a base64 `data:` URI.
pub fn parse(uri: &str) -> Result<DataUri> {
    let trimmed = uri.trim();
    if !is_data_uri(trimmed) {
        return Err(PreviewError::InvalidDataUri("missing 'data:' scheme".to_string()));
    }

    let rest = &trimmed[SCHEME.len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| PreviewError::InvalidDataUri("missing ',' separator".to_string()))?;

    let header = header.to_ascii_lowercase();
    let media = header
        .strip_suffix(BASE64_MARKER)
        .ok_or_else(|| PreviewError::InvalidDataUri("only base64 payloads are supported".to_string()))?;

    let mime_type = media.split(';').next().unwrap_or_default().trim();
    let mime_type = if mime_type.is_empty() {
        "text/plain".to_string()
    } else {
        mime_type.to_string()
    };

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PreviewError::InvalidDataUri(format!("bad base64 payload: {}", e)))?;

    Ok(DataUri { mime_type, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_header() {
        let uri = encode("image/png", &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_parse_encoded() {
        let parsed = parse("data:application/pdf;base64,JVBERi0=").unwrap();
        assert_eq!(parsed.mime_type, "application/pdf");
        assert_eq!(parsed.bytes, b"%PDF-");
    }

    #[test]
    fn test_parse_with_parameters_and_case() {
        let parsed = parse("DATA:Image/PNG;name=a.png;BASE64,iVBORw==").unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.bytes, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_parse_empty_media_type() {
        let parsed = parse("data:;base64,aGk=").unwrap();
        assert_eq!(parsed.mime_type, "text/plain");
        assert_eq!(parsed.bytes, b"hi");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("image/png;base64,aGk=").is_err());
        assert!(parse("data:image/png;base64").is_err());
        assert!(parse("data:text/plain,hello").is_err());
        assert!(parse("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_is_data_uri() {
        assert!(is_data_uri("data:image/png;base64,"));
        assert!(is_data_uri("  Data:text/plain;base64,"));
        assert!(!is_data_uri("file:///tmp/a.pdf"));
        assert!(!is_data_uri("dat"));
    }
}
