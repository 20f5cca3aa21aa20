//! Error types for the pdftoolkit rendering core.

use thiserror::Error;

/// Primary error type for PDF parsing and rendering operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("input does not start with a PDF header")]
    InvalidHeader,

    #[error("file truncated: {0}")]
    TruncatedFile(String),

    #[error("malformed token at position {pos}: {msg}")]
    MalformedToken { pos: usize, msg: String },

    #[error("malformed object at offset {offset}: {msg}")]
    MalformedObject { offset: usize, msg: String },

    #[error("circular reference detected for obj {0}")]
    CircularReference(u32),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(u32),

    #[error("unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    #[error("encrypted documents are not supported")]
    EncryptedUnsupported,

    #[error("page index {index} out of range (document has {count} pages)")]
    PageIndexOutOfRange { index: usize, count: usize },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("decode failure: {0}")]
    DecodeFailure(String),

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Shorthand for a `MalformedObject` error.
    pub fn malformed(offset: usize, msg: impl Into<String>) -> Self {
        Self::MalformedObject {
            offset,
            msg: msg.into(),
        }
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
