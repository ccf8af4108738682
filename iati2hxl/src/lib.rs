//! # iati2hxl - IATI activity reports to HXL-tagged CSV
//!
//! Reads an IATI activities document as a stream and produces one CSV row per
//! `iati-activity`, preceded by a header row and an HXL hashtag row.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │────▶│   Parser    │────▶│  Extractor  │────▶│  CSV sink   │
//! │ (URL/file)  │     │ (streaming) │     │ (rule table)│     │ (row by row)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iati2hxl::{hxl_rows, CodeTables};
//!
//! let file = std::io::BufReader::new(std::fs::File::open("activities.xml")?);
//! for row in hxl_rows(file, CodeTables::shared()) {
//!     println!("{}", row?.join(","));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Activity record subtree
//! - [`parser`] - Streaming activity reader
//! - [`codes`] - Code lookup tables
//! - [`transform`] - Rule table, extractor and pipeline
//! - [`fetch`] - Source opening (HTTP, file, stdin)
//! - [`logs`] - Progress logging to stderr

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Code tables
pub mod codes;

// Transformation
pub mod transform;

// Sources
pub mod fetch;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CodeTableError,
    ConvertError,
    ConvertResult,
    FetchError,
    OutputError,
    ParseError,
};

// =============================================================================
// Re-exports - Models and parsing
// =============================================================================

pub use models::Element;
pub use parser::{ActivityReader, ACTIVITY_ELEMENT};

// =============================================================================
// Re-exports - Code tables
// =============================================================================

pub use codes::{CodeList, CodeTable, CodeTables};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    column_count,
    convert,
    convert_source,
    hxl_rows,
    make_hashtags,
    make_headers,
    make_row,
    output_spec,
    ConvertOptions,
    ConvertStats,
    FieldRule,
    HxlRows,
    Locator,
    Row,
};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use fetch::{FetchConfig, Fetcher, Source};
