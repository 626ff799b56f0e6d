//! XML utilities for Office Open XML parts
//! Provides a reader wrapper and helper traits for attribute and text processing,
//! plus a streaming rewriter used to patch existing parts additively

use crate::error::RustyPivotError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),

    #[error("Element <{0}> not found")]
    MissingElementError(String),
}

/// XML reader wrapper configured for spreadsheet parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader; empty elements are expanded into start/end pairs
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyPivotError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(RustyPivotError::XmlError(error)),
        }
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, RustyPivotError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, RustyPivotError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyPivotError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyPivotError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => RustyPivotError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => RustyPivotError::StringEncodingError(error),
            })
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyPivotError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyPivotError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyPivotError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyPivotError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesText event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyPivotError>;

    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyPivotError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyPivotError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyPivotError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// Writer used for every emitted part
pub(crate) type PartWriter = Writer<Vec<u8>>;

/// Creates a writer with the standalone UTF-8 declaration every part starts with
pub(crate) fn part_writer() -> Result<PartWriter, RustyPivotError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    Ok(writer)
}

/// What a rewrite hook did with the event it was shown
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Rewrite {
    /// Copy the event to the output unchanged
    Keep,
    /// The hook already wrote whatever should replace the event
    Replaced,
}

/// Streams `xml` through `hook`, copying every event the hook keeps.
///
/// Empty elements are not expanded, so untouched markup round-trips unchanged.
/// The hook sees the nesting depth of the element an event belongs to
/// (the document element is depth 0).
pub(crate) fn rewrite_xml<F>(xml: &[u8], mut hook: F) -> Result<Vec<u8>, RustyPivotError>
where
    F: FnMut(&Event<'_>, usize, &mut PartWriter) -> Result<Rewrite, RustyPivotError>,
{
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
    let mut buffer = Vec::new();
    let mut depth = 0usize;

    loop {
        buffer.clear();
        let event = reader.read_event_into(&mut buffer)?;
        let level = match &event {
            Event::Eof => break,
            Event::End(_) => depth.saturating_sub(1),
            _ => depth,
        };
        if hook(&event, level, &mut writer)? == Rewrite::Keep {
            writer.write_event(event.borrow())?;
        }
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = level,
            _ => (),
        }
    }
    Ok(writer.into_inner())
}

/// Finds the namespace prefix bound to `namespace` on an element, if any
pub(crate) fn namespace_prefix(element: &BytesStart<'_>, namespace: &str) -> Result<Option<String>, RustyPivotError> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        let key = attribute.key.as_ref();
        if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            if attribute.get_value()? == namespace {
                return Ok(Some(String::from_utf8_lossy(prefix).into_owned()));
            }
        }
    }
    Ok(None)
}
