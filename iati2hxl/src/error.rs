//! Error types for the IATI to HXL conversion.
//!
//! The hierarchy mirrors the stages a source goes through:
//!
//! - [`FetchError`] - opening a source (HTTP, file, stdin)
//! - [`ParseError`] - reading the XML stream
//! - [`CodeTableError`] - loading code table overrides
//! - [`OutputError`] - writing CSV rows
//! - [`ConvertError`] - top-level, wraps all of the above
//!
//! Missing fields and unknown codes are not errors at all; they resolve to
//! empty strings or pass through unchanged inside the extractor.

use thiserror::Error;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors while opening a source document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source reference could not be understood.
    #[error("Invalid source '{source_ref}': {message}")]
    InvalidSource { source_ref: String, message: String },

    /// The HTTP client could not be built.
    #[error("Cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Local file or stdin could not be opened.
    #[error("Cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while reading the XML stream.
///
/// Rows produced before the error stay valid; the stream simply ends.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed XML.
    #[error("Malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// Malformed attribute list.
    #[error("Malformed attribute at byte {position}: {source}")]
    Attribute {
        position: u64,
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    /// The document ended inside an open element.
    #[error("Document ended inside <{element}>")]
    UnexpectedEof { element: String },

    /// The document contained no element at all.
    #[error("Document has no root element")]
    NoRootElement,
}

// =============================================================================
// Code Table Errors
// =============================================================================

/// Errors while loading code table overrides.
#[derive(Debug, Error)]
pub enum CodeTableError {
    /// Failed to read the override file.
    #[error("Cannot read code table file: {0}")]
    Io(#[from] std::io::Error),

    /// The override file is not valid JSON of the expected shape.
    #[error("Invalid code table JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The override file names a table that does not exist.
    #[error("Unknown code table '{0}' (expected status, sector, country_name or country_code)")]
    UnknownTable(String),
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing rows to the sink.
#[derive(Debug, Error)]
pub enum OutputError {
    /// CSV serialization failed.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing the underlying writer failed.
    #[error("Output flush failed: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level conversion error, returned by [`crate::convert_source`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Source could not be opened.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Source document is malformed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Code table overrides are unusable.
    #[error("Code table error: {0}")]
    Codes(#[from] CodeTableError),

    /// Rows could not be written.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for code table operations.
pub type CodeTableResult<T> = Result<T, CodeTableError>;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;
