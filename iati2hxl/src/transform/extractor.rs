//! Row extraction.
//!
//! Applies a specification table to activity records and produces fixed-width
//! rows: the header row, the hashtag row, then one row per activity.

use std::io::BufRead;
use std::iter::FusedIterator;

use super::rules::{output_spec, FieldRule};
use crate::codes::CodeTables;
use crate::error::ParseResult;
use crate::models::Element;
use crate::parser::ActivityReader;

/// One output row. Always `column_count(rules)` cells wide.
pub type Row = Vec<String>;

/// Total number of sub-columns across all rules.
pub fn column_count(rules: &[FieldRule]) -> usize {
    rules.iter().map(FieldRule::width).sum()
}

/// Header row: each rule's header repeated once per sub-column.
pub fn make_headers(rules: &[FieldRule]) -> Row {
    repeat_per_column(rules, |rule| rule.header.clone())
}

/// Hashtag row, with a space before each `+` attribute.
pub fn make_hashtags(rules: &[FieldRule]) -> Row {
    repeat_per_column(rules, |rule| rule.tag.replace('+', " +"))
}

fn repeat_per_column(rules: &[FieldRule], cell: impl Fn(&FieldRule) -> String) -> Row {
    let mut row = Vec::with_capacity(column_count(rules));
    for rule in rules {
        let value = cell(rule);
        row.extend(std::iter::repeat(value).take(rule.width()));
    }
    row
}

/// Build the data row for one activity.
///
/// Each rule searches from the activity root on its own, so rules never
/// influence one another.
pub fn make_row(rules: &[FieldRule], codes: &CodeTables, activity: &Element) -> Row {
    let mut row = Vec::with_capacity(column_count(rules));

    for rule in rules {
        let matches = rule.locator.find_all(activity);
        for n in 0..rule.width() {
            row.push(extract_value(rule, codes, matches.get(n).copied()));
        }
    }

    row
}

/// Value of one sub-column. Absent elements and attributes become `""`.
fn extract_value(rule: &FieldRule, codes: &CodeTables, element: Option<&Element>) -> String {
    let raw = match (element, &rule.attribute) {
        (Some(el), Some(attr)) => el.attribute(attr).unwrap_or(""),
        (Some(el), None) => el.text(),
        (None, _) => "",
    };

    match rule.code_list {
        Some(list) => {
            let key = match rule.key_prefix_length {
                Some(length) => prefix_chars(raw, length),
                None => raw,
            };
            codes.table(list).lookup(key).to_string()
        }
        None => raw.to_string(),
    }
}

/// First `length` characters of `value` (not bytes).
fn prefix_chars(value: &str, length: usize) -> &str {
    match value.char_indices().nth(length) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Headers,
    Hashtags,
    Records,
    Finished,
}

/// Lazy sequence of HXL rows for one document.
///
/// Yields the header row, the hashtag row, then one row per activity in
/// document order. At most one activity is held in memory. A parse failure
/// is yielded once and ends the sequence; rows already yielded stay valid.
pub struct HxlRows<'a, R> {
    rules: &'a [FieldRule],
    codes: &'a CodeTables,
    activities: ActivityReader<R>,
    stage: Stage,
    activity_count: usize,
}

impl<'a, R: BufRead> HxlRows<'a, R> {
    pub fn new(input: R, rules: &'a [FieldRule], codes: &'a CodeTables) -> Self {
        Self {
            rules,
            codes,
            activities: ActivityReader::new(input),
            stage: Stage::Headers,
            activity_count: 0,
        }
    }

    /// Start directly with data rows.
    pub fn without_frontmatter(mut self) -> Self {
        if self.stage != Stage::Finished {
            self.stage = Stage::Records;
        }
        self
    }

    /// Number of activity rows produced so far.
    pub fn activity_count(&self) -> usize {
        self.activity_count
    }

    pub fn column_count(&self) -> usize {
        column_count(self.rules)
    }
}

impl<R: BufRead> Iterator for HxlRows<'_, R> {
    type Item = ParseResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Headers => {
                self.stage = Stage::Hashtags;
                Some(Ok(make_headers(self.rules)))
            }
            Stage::Hashtags => {
                self.stage = Stage::Records;
                Some(Ok(make_hashtags(self.rules)))
            }
            Stage::Records => match self.activities.next() {
                Some(Ok(activity)) => {
                    let row = make_row(self.rules, self.codes, &activity);
                    drop(activity);
                    self.activity_count += 1;
                    Some(Ok(row))
                }
                Some(Err(e)) => {
                    self.stage = Stage::Finished;
                    Some(Err(e))
                }
                None => {
                    self.stage = Stage::Finished;
                    None
                }
            },
            Stage::Finished => None,
        }
    }
}

impl<R: BufRead> FusedIterator for HxlRows<'_, R> {}

/// Rows for `input` using the built-in specification table.
pub fn hxl_rows<R: BufRead>(input: R, codes: &CodeTables) -> HxlRows<'_, R> {
    HxlRows::new(input, output_spec(), codes)
}
