//! Streaming IATI activity reader.
//!
//! Pulls XML events from any [`BufRead`] and yields one owned [`Element`]
//! per `iati-activity`. Only the subtree of the activity currently being
//! read is held in memory; everything outside activities is skipped, apart
//! from a stack of open ancestor names used to detect truncated documents.
//!
//! Input in any encoding named by a BOM or the XML declaration is transcoded
//! to UTF-8 on the fly before it reaches the XML reader.

mod encoding;

use encoding::DecodedInput;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use std::iter::FusedIterator;

use crate::error::{ParseError, ParseResult};
use crate::models::Element;

/// Name of the element that delimits one record.
pub const ACTIVITY_ELEMENT: &str = "iati-activity";

/// Lazy, forward-only sequence of activity records.
///
/// Yields `Err` at most once; the sequence ends after it.
pub struct ActivityReader<R> {
    reader: Reader<DecodedInput<R>>,
    buf: Vec<u8>,
    /// Open elements outside any activity
    ancestors: Vec<String>,
    seen_root: bool,
    done: bool,
}

/// What the outer event loop found.
enum Scan {
    Activity(Element),
    OpenActivity(Element),
    Continue,
    End,
}

impl<R: BufRead> ActivityReader<R> {
    /// Start reading activities from `input`.
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(DecodedInput::new(input)),
            buf: Vec::new(),
            ancestors: Vec::new(),
            seen_root: false,
            done: false,
        }
    }

    /// Read up to and including the next activity.
    fn next_activity(&mut self) -> ParseResult<Option<Element>> {
        loop {
            self.buf.clear();
            let scan = {
                let event = self
                    .reader
                    .read_event_into(&mut self.buf)
                    .map_err(|e| xml_error(&self.reader, e))?;

                match event {
                    Event::Start(e) => {
                        let name = decode(&self.reader, e.local_name().as_ref())?;
                        self.seen_root = true;
                        if name == ACTIVITY_ELEMENT {
                            Scan::OpenActivity(open_element(&self.reader, &e, name)?)
                        } else {
                            self.ancestors.push(name);
                            Scan::Continue
                        }
                    }
                    Event::Empty(e) => {
                        let name = decode(&self.reader, e.local_name().as_ref())?;
                        self.seen_root = true;
                        if name == ACTIVITY_ELEMENT {
                            Scan::Activity(open_element(&self.reader, &e, name)?)
                        } else {
                            Scan::Continue
                        }
                    }
                    Event::End(_) => {
                        self.ancestors.pop();
                        Scan::Continue
                    }
                    Event::Eof => Scan::End,
                    _ => Scan::Continue,
                }
            };

            match scan {
                Scan::Activity(activity) => return Ok(Some(activity)),
                Scan::OpenActivity(root) => return self.read_subtree(root).map(Some),
                Scan::Continue => {}
                Scan::End => {
                    if let Some(element) = self.ancestors.pop() {
                        return Err(ParseError::UnexpectedEof { element });
                    }
                    if !self.seen_root {
                        return Err(ParseError::NoRootElement);
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Read the rest of an activity whose start tag has been consumed.
    fn read_subtree(&mut self, root: Element) -> ParseResult<Element> {
        let mut stack = vec![root];

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| xml_error(&self.reader, e))?;

            match event {
                Event::Start(e) => {
                    let name = decode(&self.reader, e.local_name().as_ref())?;
                    stack.push(open_element(&self.reader, &e, name)?);
                }
                Event::Empty(e) => {
                    let name = decode(&self.reader, e.local_name().as_ref())?;
                    let child = open_element(&self.reader, &e, name)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(child);
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| xml_error(&self.reader, e.into()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    let text = decode(&self.reader, &c)?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::End(_) => {
                    if let Some(closed) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(closed),
                            None => return Ok(closed),
                        }
                    }
                }
                Event::Eof => {
                    let element = stack
                        .last()
                        .map(|e| e.name.clone())
                        .unwrap_or_else(|| ACTIVITY_ELEMENT.to_string());
                    return Err(ParseError::UnexpectedEof { element });
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for ActivityReader<R> {
    type Item = ParseResult<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_activity() {
            Ok(Some(activity)) => Some(Ok(activity)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for ActivityReader<R> {}

/// Build an element (name and attributes) from a start tag.
fn open_element<R>(
    reader: &Reader<R>,
    start: &BytesStart<'_>,
    name: String,
) -> ParseResult<Element> {
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|source| ParseError::Attribute {
            position: reader.buffer_position() as u64,
            source,
        })?;
        let key = decode(reader, attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(reader, e.into()))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn decode<R>(reader: &Reader<R>, bytes: &[u8]) -> ParseResult<String> {
    reader
        .decoder()
        .decode(bytes)
        .map(|s| s.into_owned())
        .map_err(|e| xml_error(reader, e.into()))
}

fn xml_error<R>(reader: &Reader<R>, source: quick_xml::Error) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str) -> Vec<ParseResult<Element>> {
        ActivityReader::new(xml.as_bytes()).collect()
    }

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_two_activities_in_order() {
        let xml = r#"<?xml version="1.0"?>
<iati-activities version="2.03">
  <iati-activity last-updated-datetime="2021-03-04T10:00:00Z">
    <iati-identifier>XM-1</iati-identifier>
  </iati-activity>
  <iati-activity>
    <iati-identifier>XM-2</iati-identifier>
  </iati-activity>
</iati-activities>"#;

        let activities: Vec<Element> = read_all(xml).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(activities.len(), 2);
        assert_eq!(
            activities[0].attribute("last-updated-datetime"),
            Some("2021-03-04T10:00:00Z")
        );
        assert_eq!(activities[0].children[0].text(), "XM-1");
        assert_eq!(activities[1].children[0].text(), "XM-2");
    }

    #[test]
    fn test_nested_narratives() {
        let xml = r#"<iati-activities><iati-activity>
  <reporting-org ref="XM-DAC-1"><narrative xml:lang="en">Donor</narrative></reporting-org>
  <title><narrative>Schools</narrative></title>
</iati-activity></iati-activities>"#;

        let activity = read_all(xml).remove(0).unwrap();
        let org = &activity.children[0];

        assert_eq!(org.name, "reporting-org");
        assert_eq!(org.attribute("ref"), Some("XM-DAC-1"));
        assert_eq!(org.children[0].text(), "Donor");
        assert_eq!(org.children[0].attribute("xml:lang"), Some("en"));
        assert_eq!(activity.children[1].children[0].text(), "Schools");
    }

    #[test]
    fn test_entities_and_cdata() {
        let xml = "<iati-activities><iati-activity>\
<title><narrative>Water &amp; Sanitation</narrative></title>\
<description><narrative><![CDATA[a < b]]></narrative></description>\
</iati-activity></iati-activities>";

        let activity = read_all(xml).remove(0).unwrap();
        assert_eq!(activity.children[0].children[0].text(), "Water & Sanitation");
        assert_eq!(activity.children[1].children[0].text(), "a < b");
    }

    #[test]
    fn test_self_closing_elements() {
        let xml = r#"<iati-activities>
  <iati-activity/>
  <iati-activity><sector code="11220"/><recipient-country code="KE"/></iati-activity>
</iati-activities>"#;

        let activities: Vec<Element> = read_all(xml).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(activities.len(), 2);
        assert!(activities[0].children.is_empty());
        assert_eq!(activities[1].children.len(), 2);
        assert_eq!(activities[1].children[1].attribute("code"), Some("KE"));
    }

    #[test]
    fn test_empty_document_has_no_activities() {
        assert!(read_all("<iati-activities/>").is_empty());
        assert!(read_all("<iati-activities></iati-activities>").is_empty());
    }

    #[test]
    fn test_no_root_is_an_error() {
        let results = read_all("");
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ParseError::NoRootElement)));
    }

    #[test]
    fn test_truncated_document() {
        let xml = "<iati-activities><iati-activity><iati-identifier>XM-1</iati-identifier></iati-activity><iati-activity><title>";
        let results = read_all(xml);

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(ParseError::UnexpectedEof { element }) => assert_eq!(element, "title"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_outside_activity() {
        let results = read_all("<iati-activities><iati-activity/>");
        assert_eq!(results.len(), 2);
        match &results[1] {
            Err(ParseError::UnexpectedEof { element }) => assert_eq!(element, "iati-activities"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_tag_stops_sequence() {
        let xml = "<iati-activities><iati-activity/><iati-activity><title></iati-activity></iati-activities>";
        let mut reader = ActivityReader::new(xml.as_bytes());

        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(reader.next(), Some(Err(ParseError::Xml { .. }))));
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_latin1_declared_document() {
        let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
<iati-activities><iati-activity>\
<title><narrative>Caf\xE9</narrative></title>\
<recipient-country code=\"CI\" label=\"C\xF4te d'Ivoire\"/>\
</iati-activity></iati-activities>";

        let activities: Vec<Element> = ActivityReader::new(&xml[..])
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].children[0].children[0].text(), "Café");
        assert_eq!(
            activities[0].children[1].attribute("label"),
            Some("Côte d'Ivoire")
        );
    }

    #[test]
    fn test_utf16_document_with_bom() {
        let xml = r#"<?xml version="1.0" encoding="UTF-16"?>
<iati-activities>
  <iati-activity><iati-identifier>XM-Zürich-1</iati-identifier></iati-activity>
  <iati-activity><iati-identifier>XM-2</iati-identifier></iati-activity>
</iati-activities>"#;
        let bytes = utf16le_with_bom(xml);

        let ids: Vec<String> = ActivityReader::new(&bytes[..])
            .map(|r| r.unwrap().children[0].text().to_string())
            .collect();
        assert_eq!(ids, vec!["XM-Zürich-1", "XM-2"]);
    }

    #[test]
    fn test_utf8_bom_is_ignored() {
        let xml = "\u{FEFF}<iati-activities><iati-activity/></iati-activities>";
        let results = read_all(xml);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }
}
