//! High-level conversion API.
//!
//! Drains the lazy row sequence of a document into a CSV writer, one row at
//! a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use iati2hxl::{convert, CodeTables, ConvertOptions};
//!
//! let input = std::io::BufReader::new(std::fs::File::open("activities.xml")?);
//! let mut writer = csv::Writer::from_writer(std::io::stdout());
//! let stats = convert(input, &mut writer, CodeTables::shared(), &ConvertOptions::default())?;
//! eprintln!("{} activities", stats.activities);
//! ```

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use super::extractor::HxlRows;
use super::rules::output_spec;
use crate::codes::CodeTables;
use crate::error::{ConvertError, ConvertResult, OutputError};
use crate::fetch::{Fetcher, Source};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};

/// Options for one conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Write the header and hashtag rows before the data
    pub include_frontmatter: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_frontmatter: true,
        }
    }
}

/// Summary of one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvertStats {
    /// Data rows written
    pub activities: usize,
    /// Width of every row
    pub columns: usize,
}

/// Convert one document into CSV rows on `writer`.
///
/// On a parse failure the rows already written are flushed and kept; the
/// error is then returned.
pub fn convert<R: BufRead, W: Write>(
    input: R,
    writer: &mut csv::Writer<W>,
    codes: &CodeTables,
    options: &ConvertOptions,
) -> ConvertResult<ConvertStats> {
    let mut rows = HxlRows::new(input, output_spec(), codes);
    if !options.include_frontmatter {
        rows = rows.without_frontmatter();
    }

    for row in rows.by_ref() {
        match row {
            Ok(row) => writer.write_record(&row).map_err(OutputError::from)?,
            Err(e) => {
                writer.flush().map_err(OutputError::from)?;
                return Err(e.into());
            }
        }
    }
    writer.flush().map_err(OutputError::from)?;

    Ok(ConvertStats {
        activities: rows.activity_count(),
        columns: rows.column_count(),
    })
}

/// Open `source` and convert it.
pub fn convert_source<W: Write>(
    source: &Source,
    fetcher: &Fetcher,
    writer: &mut csv::Writer<W>,
    codes: &CodeTables,
    options: &ConvertOptions,
) -> ConvertResult<ConvertStats> {
    log_info(format!("📥 Reading {}", source));
    let input = fetcher.open(source)?;

    match convert(input, writer, codes, options) {
        Ok(stats) => {
            log_success(format!("{}: {} activities", source, stats.activities));
            Ok(stats)
        }
        Err(ConvertError::Parse(e)) => {
            log_warning(format!("{}: stopped early, rows written so far are kept", source));
            log_info_indent(e.to_string(), 1);
            Err(ConvertError::Parse(e))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::fetch::FetchConfig;

    const TWO_ACTIVITIES: &str = r#"<iati-activities>
  <iati-activity last-updated-datetime="2022-01-01">
    <iati-identifier>XM-1</iati-identifier>
    <title><narrative>Clean water, phase 2</narrative></title>
    <activity-status code="3"/>
  </iati-activity>
  <iati-activity>
    <iati-identifier>XM-2</iati-identifier>
  </iati-activity>
</iati-activities>"#;

    fn convert_str(xml: &str, options: &ConvertOptions) -> (ConvertResult<ConvertStats>, String) {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let result = convert(xml.as_bytes(), &mut writer, CodeTables::shared(), options);
        let bytes = writer.into_inner().unwrap();
        (result, String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_default_options() {
        assert!(ConvertOptions::default().include_frontmatter);
    }

    #[test]
    fn test_convert_writes_csv() {
        let (result, output) = convert_str(TWO_ACTIVITIES, &ConvertOptions::default());
        let stats = result.unwrap();

        assert_eq!(stats, ConvertStats { activities: 2, columns: 25 });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("IATI id,Last updated,Activity status,"));
        assert!(lines[1].starts_with("#activity +id,#date +updated,#status,"));
        assert!(lines[2].starts_with("XM-1,2022-01-01,Completion,,,,,\"Clean water, phase 2\","));
        assert_eq!(lines[3], format!("XM-2{}", ",".repeat(24)));
    }

    #[test]
    fn test_convert_without_frontmatter() {
        let options = ConvertOptions {
            include_frontmatter: false,
        };
        let (result, output) = convert_str(TWO_ACTIVITIES, &options);

        assert_eq!(result.unwrap().activities, 2);
        assert_eq!(output.lines().count(), 2);
        assert!(output.starts_with("XM-1,"));
    }

    #[test]
    fn test_empty_document() {
        let (result, output) = convert_str("<iati-activities/>", &ConvertOptions::default());
        assert_eq!(result.unwrap().activities, 0);
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_parse_error_keeps_partial_output() {
        let xml = "<iati-activities><iati-activity><iati-identifier>XM-1</iati-identifier></iati-activity><iati-activity>";
        let (result, output) = convert_str(xml, &ConvertOptions::default());

        assert!(matches!(
            result,
            Err(ConvertError::Parse(ParseError::UnexpectedEof { .. }))
        ));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("XM-1,"));
    }

    #[test]
    fn test_same_input_same_output() {
        let (_, first) = convert_str(TWO_ACTIVITIES, &ConvertOptions::default());
        let (_, second) = convert_str(TWO_ACTIVITIES, &ConvertOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_convert_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", TWO_ACTIVITIES).unwrap();

        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let source = Source::File(file.path().to_path_buf());
        let mut writer = csv::Writer::from_writer(Vec::new());

        let stats = convert_source(
            &source,
            &fetcher,
            &mut writer,
            CodeTables::shared(),
            &ConvertOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.activities, 2);

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(output.lines().count(), 4);
    }

    #[test]
    fn test_convert_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::File(dir.path().join("nope.xml"));
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());

        let result = convert_source(
            &source,
            &fetcher,
            &mut writer,
            CodeTables::shared(),
            &ConvertOptions::default(),
        );
        assert!(matches!(result, Err(ConvertError::Fetch(_))));
        assert!(writer.into_inner().unwrap().is_empty());
    }
}
