//! Transformation module.
//!
//! This module handles IATI to HXL transformation:
//! - Rules: the field specification table
//! - Extractor: rows from activity records
//! - Pipeline: rows into a CSV sink

pub mod extractor;
pub mod pipeline;
pub mod rules;

pub use extractor::{column_count, hxl_rows, make_hashtags, make_headers, make_row, HxlRows, Row};
pub use pipeline::{convert, convert_source, ConvertOptions, ConvertStats};
pub use rules::{output_spec, FieldRule, Locator, Step};
