//! Field specification table.
//!
//! Each [`FieldRule`] says where to find a value inside an activity, how many
//! occurrences become columns, and how to label and translate them. The table
//! is fixed at build time; see [`output_spec`].

use once_cell::sync::Lazy;
use std::fmt;
use std::num::NonZeroUsize;

use crate::codes::CodeList;
use crate::models::Element;

/// One step of a [`Locator`]: a child element name with an optional
/// attribute filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub filter: Option<(String, String)>,
}

impl Step {
    fn matches(&self, element: &Element) -> bool {
        match &self.filter {
            Some((key, value)) => element.attribute(key) == Some(value.as_str()),
            None => true,
        }
    }
}

/// Path from an activity to zero or more elements inside it.
///
/// An empty locator selects the activity itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locator {
    steps: Vec<Step>,
}

impl Locator {
    /// The activity element itself (`.`).
    pub fn this() -> Self {
        Self::default()
    }

    /// A single child step (`./name`).
    pub fn child(name: impl Into<String>) -> Self {
        Self::path(&[name.into().as_str()])
    }

    /// Nested child steps (`./a/b`).
    pub fn path(names: &[&str]) -> Self {
        Self {
            steps: names
                .iter()
                .map(|name| Step {
                    name: name.to_string(),
                    filter: None,
                })
                .collect(),
        }
    }

    /// Keep only elements of the last step whose `key` attribute equals `value`.
    pub fn where_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.filter = Some((key.into(), value.into()));
        }
        self
    }

    /// All matches under `root`, in document order.
    ///
    /// Only descends into `root`; never looks at siblings or ancestors.
    pub fn find_all<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut current = vec![root];
        for step in &self.steps {
            current = current
                .into_iter()
                .flat_map(|el| el.children.iter())
                .filter(|el| el.name == step.name && step.matches(el))
                .collect();
        }
        current
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(".")?;
        for step in &self.steps {
            write!(f, "/{}", step.name)?;
            if let Some((key, value)) = &step.filter {
                write!(f, "[@{}=\"{}\"]", key, value)?;
            }
        }
        Ok(())
    }
}

/// One column group of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// Where the values live
    pub locator: Locator,
    /// Attribute to read; `None` reads the element text
    pub attribute: Option<String>,
    /// Number of sub-columns; extra matches are dropped, missing ones padded
    pub max_occurrences: NonZeroUsize,
    /// Display header, repeated for each sub-column
    pub header: String,
    /// HXL hashtag with attributes, e.g. `#org+name+reporting`
    pub tag: String,
    /// Table the raw value is translated through
    pub code_list: Option<CodeList>,
    /// Leading characters of the raw value used as lookup key
    pub key_prefix_length: Option<usize>,
}

impl FieldRule {
    /// Single-column rule reading element text.
    pub fn new(locator: Locator, header: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            locator,
            attribute: None,
            max_occurrences: NonZeroUsize::MIN,
            header: header.into(),
            tag: tag.into(),
            code_list: None,
            key_prefix_length: None,
        }
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attribute = Some(name.into());
        self
    }

    /// Zero is treated as one.
    pub fn occurrences(mut self, n: usize) -> Self {
        self.max_occurrences = NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn codes(mut self, list: CodeList) -> Self {
        self.code_list = Some(list);
        self
    }

    pub fn key_prefix(mut self, length: usize) -> Self {
        self.key_prefix_length = Some(length);
        self
    }

    pub fn width(&self) -> usize {
        self.max_occurrences.get()
    }
}

static OUTPUT_SPEC: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    let date = |kind: &str| Locator::child("activity-date").where_attribute("type", kind);

    vec![
        FieldRule::new(Locator::child("iati-identifier"), "IATI id", "#activity+id"),
        FieldRule::new(Locator::this(), "Last updated", "#date+updated")
            .attribute("last-updated-datetime"),
        FieldRule::new(Locator::child("activity-status"), "Activity status", "#status")
            .attribute("code")
            .codes(CodeList::Status),
        FieldRule::new(
            Locator::path(&["reporting-org", "narrative"]),
            "Reporting org",
            "#org+name+reporting",
        ),
        FieldRule::new(
            Locator::path(&["participating-org", "narrative"]),
            "Participating org",
            "#org+name+participating",
        )
        .occurrences(3),
        FieldRule::new(
            Locator::path(&["title", "narrative"]),
            "Activity",
            "#activity+name",
        ),
        FieldRule::new(Locator::child("sector"), "DAC sector", "#sector+name")
            .attribute("code")
            .occurrences(3)
            .codes(CodeList::Sector)
            .key_prefix(3),
        FieldRule::new(
            Locator::child("recipient-country"),
            "Country name",
            "#country+name+recipient",
        )
        .attribute("code")
        .occurrences(5)
        .codes(CodeList::CountryName),
        FieldRule::new(
            Locator::child("recipient-country"),
            "Country code",
            "#country+code+recipient",
        )
        .attribute("code")
        .occurrences(5)
        .codes(CodeList::CountryCode),
        FieldRule::new(date("1"), "Planned start date", "#date+planned+start")
            .attribute("iso-date"),
        FieldRule::new(date("2"), "Actual start date", "#date+actual+start").attribute("iso-date"),
        FieldRule::new(date("3"), "Planned end date", "#date+planned+end").attribute("iso-date"),
        FieldRule::new(date("4"), "Actual end date", "#date+actual+end").attribute("iso-date"),
    ]
});

/// The compiled-in specification table, in column order.
pub fn output_spec() -> &'static [FieldRule] {
    &OUTPUT_SPEC
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity() -> Element {
        Element::new("iati-activity")
            .with_child(
                Element::new("participating-org")
                    .with_child(Element::new("narrative").with_text("First")),
            )
            .with_child(Element::new("title").with_child(Element::new("narrative").with_text("T")))
            .with_child(
                Element::new("participating-org")
                    .with_child(Element::new("narrative").with_text("Second"))
                    .with_child(Element::new("narrative").with_text("Second (fr)")),
            )
            .with_child(Element::new("activity-date").with_attribute("type", "1"))
            .with_child(Element::new("activity-date").with_attribute("type", "2"))
    }

    #[test]
    fn test_nested_path_in_document_order() {
        let el = activity();
        let found = Locator::path(&["participating-org", "narrative"]).find_all(&el);
        let texts: Vec<_> = found.iter().map(|e| e.text()).collect();
        assert_eq!(texts, vec!["First", "Second", "Second (fr)"]);
    }

    #[test]
    fn test_attribute_filter() {
        let el = activity();
        let found = Locator::child("activity-date")
            .where_attribute("type", "2")
            .find_all(&el);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute("type"), Some("2"));

        let none = Locator::child("activity-date")
            .where_attribute("type", "4")
            .find_all(&el);
        assert!(none.is_empty());
    }

    #[test]
    fn test_this_selects_root() {
        let el = activity();
        let found = Locator::this().find_all(&el);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "iati-activity");
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::this().to_string(), ".");
        assert_eq!(
            Locator::path(&["reporting-org", "narrative"]).to_string(),
            "./reporting-org/narrative"
        );
        assert_eq!(
            Locator::child("activity-date")
                .where_attribute("type", "1")
                .to_string(),
            "./activity-date[@type=\"1\"]"
        );
    }

    #[test]
    fn test_zero_occurrences_becomes_one() {
        let rule = FieldRule::new(Locator::this(), "h", "#t").occurrences(0);
        assert_eq!(rule.width(), 1);
    }

    #[test]
    fn test_output_spec_layout() {
        let rules = output_spec();
        let widths: Vec<_> = rules.iter().map(|r| (r.header.as_str(), r.width())).collect();

        assert_eq!(
            widths,
            vec![
                ("IATI id", 1),
                ("Last updated", 1),
                ("Activity status", 1),
                ("Reporting org", 1),
                ("Participating org", 3),
                ("Activity", 1),
                ("DAC sector", 3),
                ("Country name", 5),
                ("Country code", 5),
                ("Planned start date", 1),
                ("Actual start date", 1),
                ("Planned end date", 1),
                ("Actual end date", 1),
            ]
        );
        assert_eq!(rules[6].key_prefix_length, Some(3));
    }
}
