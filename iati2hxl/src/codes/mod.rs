//! Code lookup tables.
//!
//! Static mappings from IATI codes to labels, loaded once at start-up and
//! shared read-only by every extraction. Optional overrides are merged from a
//! JSON file before any conversion starts:
//!
//! ```json
//! { "status": { "2": "Ongoing" }, "sector": { "998": "Other" } }
//! ```

mod data;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{CodeTableError, CodeTableResult};

/// Which table a field rule translates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeList {
    /// IATI ActivityStatus
    Status,
    /// DAC 3-digit sector categories
    Sector,
    /// ISO 3166-1 alpha-2 to English name
    CountryName,
    /// ISO 3166-1 alpha-2 normalisation
    CountryCode,
}

impl CodeList {
    pub const ALL: [CodeList; 4] = [
        CodeList::Status,
        CodeList::Sector,
        CodeList::CountryName,
        CodeList::CountryCode,
    ];

    /// Key used in override files.
    pub fn key(&self) -> &'static str {
        match self {
            CodeList::Status => "status",
            CodeList::Sector => "sector",
            CodeList::CountryName => "country_name",
            CodeList::CountryCode => "country_code",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.key() == key)
    }
}

impl fmt::Display for CodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One immutable code → label mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    entries: HashMap<String, String>,
}

impl CodeTable {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Label for `code`, or `code` itself when the table has no entry.
    pub fn lookup<'a>(&'a self, code: &'a str) -> &'a str {
        self.entries.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn merge(&mut self, overrides: HashMap<String, String>) {
        self.entries.extend(overrides);
    }
}

/// The full set of tables an extractor translates through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTables {
    status: CodeTable,
    sector: CodeTable,
    country_name: CodeTable,
    country_code: CodeTable,
}

/// Built-in tables, constructed on first use.
static BUILTIN: Lazy<CodeTables> = Lazy::new(CodeTables::builtin);

impl CodeTables {
    /// Build the tables compiled into the binary.
    pub fn builtin() -> Self {
        let country_code = data::COUNTRY_NAMES
            .iter()
            .flat_map(|(code, _)| {
                [
                    (code.to_string(), code.to_string()),
                    (code.to_lowercase(), code.to_string()),
                ]
            })
            .collect();

        Self {
            status: CodeTable::from_pairs(data::STATUS_CODES.iter().copied()),
            sector: CodeTable::from_pairs(data::DAC_SECTOR_CATEGORIES.iter().copied()),
            country_name: CodeTable::from_pairs(data::COUNTRY_NAMES.iter().copied()),
            country_code: CodeTable {
                entries: country_code,
            },
        }
    }

    /// Shared built-in tables.
    pub fn shared() -> &'static CodeTables {
        &BUILTIN
    }

    /// Built-in tables with overrides from a JSON file merged on top.
    pub fn with_overrides_file(path: impl AsRef<Path>) -> CodeTableResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut tables = Self::builtin();
        tables.apply_overrides_json(&content)?;
        Ok(tables)
    }

    /// Merge overrides given as `{ "<table>": { "<code>": "<label>" } }`.
    pub fn apply_overrides_json(&mut self, json: &str) -> CodeTableResult<()> {
        let overrides: HashMap<String, HashMap<String, String>> = serde_json::from_str(json)?;

        // Reject unknown names before touching anything
        for name in overrides.keys() {
            if CodeList::from_key(name).is_none() {
                return Err(CodeTableError::UnknownTable(name.clone()));
            }
        }

        for (name, entries) in overrides {
            if let Some(list) = CodeList::from_key(&name) {
                self.table_mut(list).merge(entries);
            }
        }
        Ok(())
    }

    pub fn table(&self, list: CodeList) -> &CodeTable {
        match list {
            CodeList::Status => &self.status,
            CodeList::Sector => &self.sector,
            CodeList::CountryName => &self.country_name,
            CodeList::CountryCode => &self.country_code,
        }
    }

    fn table_mut(&mut self, list: CodeList) -> &mut CodeTable {
        match list {
            CodeList::Status => &mut self.status,
            CodeList::Sector => &mut self.sector,
            CodeList::CountryName => &mut self.country_name,
            CodeList::CountryCode => &mut self.country_code,
        }
    }
}

impl Default for CodeTables {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_status_labels() {
        let tables = CodeTables::shared();
        assert_eq!(tables.table(CodeList::Status).lookup("2"), "Implementation");
        assert_eq!(tables.table(CodeList::Status).lookup("6"), "Suspended");
        assert_eq!(tables.table(CodeList::Status).len(), 6);
        assert_eq!(tables.table(CodeList::Status).get("7"), None);
        assert!(!tables.table(CodeList::Sector).is_empty());
    }

    #[test]
    fn test_unknown_code_passes_through() {
        let tables = CodeTables::shared();
        assert_eq!(tables.table(CodeList::Status).lookup("99"), "99");
        assert_eq!(tables.table(CodeList::Sector).lookup(""), "");
    }

    #[test]
    fn test_sector_categories() {
        let sector = CodeTables::shared().table(CodeList::Sector);
        assert_eq!(sector.lookup("112"), "Basic Education");
        assert_eq!(sector.lookup("720"), "Emergency Response");
    }

    #[test]
    fn test_country_tables() {
        let tables = CodeTables::shared();
        assert_eq!(tables.table(CodeList::CountryName).lookup("KE"), "Kenya");
        assert_eq!(tables.table(CodeList::CountryCode).lookup("KE"), "KE");
        assert_eq!(tables.table(CodeList::CountryCode).lookup("ke"), "KE");
        assert_eq!(tables.table(CodeList::CountryCode).lookup("XK1"), "XK1");
    }

    #[test]
    fn test_overrides_merge() {
        let mut tables = CodeTables::builtin();
        tables
            .apply_overrides_json(r#"{"status": {"2": "Ongoing"}, "sector": {"999": "Misc"}}"#)
            .unwrap();

        assert_eq!(tables.table(CodeList::Status).lookup("2"), "Ongoing");
        assert_eq!(tables.table(CodeList::Status).lookup("3"), "Completion");
        assert_eq!(tables.table(CodeList::Sector).lookup("999"), "Misc");
    }

    #[test]
    fn test_unknown_override_table_rejected() {
        let mut tables = CodeTables::builtin();
        let err = tables
            .apply_overrides_json(r#"{"status": {"2": "Ongoing"}, "regions": {}}"#)
            .unwrap_err();

        assert!(matches!(err, CodeTableError::UnknownTable(ref name) if name == "regions"));
        // Nothing applied
        assert_eq!(tables.table(CodeList::Status).lookup("2"), "Implementation");
    }

    #[test]
    fn test_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"country_name": {{"KE": "Republic of Kenya"}}}}"#).unwrap();

        let tables = CodeTables::with_overrides_file(file.path()).unwrap();
        assert_eq!(tables.table(CodeList::CountryName).lookup("KE"), "Republic of Kenya");
    }

    #[test]
    fn test_invalid_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = CodeTables::with_overrides_file(file.path()).unwrap_err();
        assert!(matches!(err, CodeTableError::Json(_)));
    }

    #[test]
    fn test_code_list_keys_round_trip() {
        for list in CodeList::ALL {
            assert_eq!(CodeList::from_key(list.key()), Some(list));
        }
        assert_eq!(CodeList::from_key("regions"), None);
    }
}
