//! Error types for media previews.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the media-preview library.
#[derive(Error, Debug)]
pub enum PreviewError {
    /// The document loader reported a failure for a locator.
    #[error("Failed to load document '{locator}': {message}")]
    DocumentLoad { locator: String, message: String },

    /// The locator scheme cannot be resolved to a local document source.
    #[error("Unsupported locator: {0}. Supported: file paths, file:// and data: URIs")]
    UnsupportedLocator(String),

    /// Pdfium library error.
    #[error("Pdfium error: {0}")]
    PdfiumError(String),

    /// PDF rendering failed.
    #[error("PDF rendering failed: {0}")]
    PdfRenderError(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncodingError(String),

    /// Reading a selected file failed.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The selected file has no content to preview.
    #[error("File is empty: {0}")]
    EmptyFile(PathBuf),

    /// The selected file exceeds the configured preview limit.
    #[error("File '{path}' is too large for preview: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Malformed data URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, PreviewError>;

impl From<tokio::task::JoinError> for PreviewError {
    fn from(err: tokio::task::JoinError) -> Self {
        PreviewError::TaskFailed(err.to_string())
    }
}

impl From<serde_json::Error> for PreviewError {
    fn from(err: serde_json::Error) -> Self {
        PreviewError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_document_load() {
        let err = PreviewError::DocumentLoad {
            locator: "file:///tmp/report.pdf".to_string(),
            message: "corrupt xref table".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("file:///tmp/report.pdf"));
        assert!(msg.contains("corrupt xref table"));
    }

    #[test]
    fn test_error_display_unsupported_locator() {
        let err = PreviewError::UnsupportedLocator("https://example.com/a.pdf".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("https://example.com/a.pdf"));
        assert!(msg.contains("Supported"));
    }

    #[test]
    fn test_error_display_file_too_large() {
        let err = PreviewError::FileTooLarge {
            path: PathBuf::from("/photos/huge.png"),
            size: 20,
            limit: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/photos/huge.png"));
        assert!(msg.contains("20 bytes"));
        assert!(msg.contains("limit 10"));
    }

    #[test]
    fn test_error_display_empty_file() {
        let err = PreviewError::EmptyFile(PathBuf::from("avatar.png"));
        assert!(format!("{}", err).contains("avatar.png"));
    }

    #[test]
    fn test_error_file_read_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = PreviewError::FileRead {
            path: PathBuf::from("missing.png"),
            source: io_err,
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("no such file"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PreviewError = json_err.into();
        match err {
            PreviewError::InvalidConfig(_) => (),
            _ => panic!("Expected InvalidConfig"),
        }
    }

    #[test]
    fn test_error_debug_impl() {
        let err = PreviewError::PdfiumError("test error".to_string());
        let debug = format!("{:?}", err);
        assert!(debug.contains("PdfiumError"));
        assert!(debug.contains("test error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(PreviewError::InvalidDataUri("missing comma".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
