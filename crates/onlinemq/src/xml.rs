//! XML reading and writing helpers shared by the wire codec.
//!
//! Documents exchanged with the service are shallow: a root element holding
//! scalar child elements. [`XmlDocument`] flattens such a document into a map
//! from element name to its text, keeping the last occurrence when a name
//! repeats. [`XmlBuilder`] writes the same shape.

use crate::error::SerializationError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt::Display;

/// Scalar type annotation carried in an element's `type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueType {
    Integer,
    Boolean,
}

impl ValueType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct XmlElement {
    text: String,
    attributes: HashMap<String, String>,
}

/// Flattened view of a parsed XML document
#[derive(Debug, Clone)]
pub(crate) struct XmlDocument {
    root: String,
    elements: HashMap<String, XmlElement>,
}

impl XmlDocument {
    /// Parse a document, collecting the direct text of every element.
    pub(crate) fn parse(xml: &str) -> Result<Self, SerializationError> {
        let mut reader = Reader::from_str(xml);

        let mut root: Option<String> = None;
        let mut stack: Vec<(String, XmlElement)> = Vec::new();
        let mut elements = HashMap::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let attributes = read_attributes(e)?;
                    if root.is_none() {
                        root = Some(name.clone());
                    }
                    stack.push((
                        name,
                        XmlElement {
                            text: String::new(),
                            attributes,
                        },
                    ));
                }
                Ok(Event::Empty(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let attributes = read_attributes(e)?;
                    if root.is_none() {
                        root = Some(name.clone());
                    }
                    elements.insert(
                        name,
                        XmlElement {
                            text: String::new(),
                            attributes,
                        },
                    );
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| SerializationError::Xml {
                        message: format!("Failed to unescape text: {}", e),
                    })?;
                    if let Some((_, element)) = stack.last_mut() {
                        element.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    let text =
                        std::str::from_utf8(&e).map_err(|_| SerializationError::InvalidUtf8 {
                            field: "CDATA section".to_string(),
                        })?;
                    if let Some((_, element)) = stack.last_mut() {
                        element.text.push_str(text);
                    }
                }
                Ok(Event::End(_)) => {
                    if let Some((name, element)) = stack.pop() {
                        elements.insert(name, element);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SerializationError::Xml {
                        message: format!(
                            "XML parsing error at position {}: {}",
                            reader.buffer_position(),
                            e
                        ),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some((name, _)) = stack.last() {
            return Err(SerializationError::Xml {
                message: format!("Unclosed element <{}>", name),
            });
        }

        let root = root.ok_or_else(|| SerializationError::Xml {
            message: "Document has no root element".to_string(),
        })?;

        Ok(Self { root, elements })
    }

    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    /// Fail unless the root element has one of the expected names
    pub(crate) fn expect_root(&self, expected: &[&str]) -> Result<(), SerializationError> {
        let root = self.root();
        if expected.contains(&root) {
            Ok(())
        } else {
            Err(SerializationError::UnexpectedRoot {
                expected: expected.join("|"),
                found: root.to_string(),
            })
        }
    }

    /// Raw text of an element, `None` when the element is absent
    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        self.elements.get(name).map(|e| e.text.as_str())
    }

    pub(crate) fn attribute(&self, name: &str, attribute: &str) -> Option<&str> {
        self.elements
            .get(name)
            .and_then(|e| e.attributes.get(attribute))
            .map(|s| s.as_str())
    }

    /// Text of an element; absent or empty elements yield `None`
    pub(crate) fn optional_string(&self, name: &str) -> Option<String> {
        self.text(name)
            .filter(|text| !text.is_empty())
            .map(|text| text.to_string())
    }

    pub(crate) fn required_string(&self, name: &str) -> Result<String, SerializationError> {
        self.optional_string(name)
            .ok_or_else(|| SerializationError::MissingField {
                field: name.to_string(),
            })
    }

    pub(crate) fn optional_u64(&self, name: &str) -> Result<Option<u64>, SerializationError> {
        let text = match self.text(name).map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(None),
        };

        text.parse::<u64>()
            .map(Some)
            .map_err(|e| SerializationError::InvalidField {
                field: name.to_string(),
                message: format!("expected integer, got '{}': {}", text, e),
            })
    }

    pub(crate) fn required_u64(&self, name: &str) -> Result<u64, SerializationError> {
        self.optional_u64(name)?
            .ok_or_else(|| SerializationError::MissingField {
                field: name.to_string(),
            })
    }

    pub(crate) fn optional_bool(&self, name: &str) -> Result<Option<bool>, SerializationError> {
        let text = match self.text(name).map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(None),
        };

        match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(SerializationError::InvalidField {
                field: name.to_string(),
                message: format!("expected boolean, got '{}'", text),
            }),
        }
    }

    pub(crate) fn required_bool(&self, name: &str) -> Result<bool, SerializationError> {
        self.optional_bool(name)?
            .ok_or_else(|| SerializationError::MissingField {
                field: name.to_string(),
            })
    }
}

fn read_attributes(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<HashMap<String, String>, SerializationError> {
    let mut attributes = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| SerializationError::Xml {
            message: format!("Invalid attribute: {}", e),
        })?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| SerializationError::Xml {
                message: format!("Invalid attribute value: {}", e),
            })?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Reject characters that XML 1.0 cannot carry, even escaped.
pub(crate) fn check_xml_chars<'a>(
    field: &str,
    text: &'a str,
) -> Result<&'a str, SerializationError> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(SerializationError::IllegalCharacter {
            field: field.to_string(),
            code_point: u32::from(c),
        }),
        None => Ok(text),
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}

/// Writer for shallow documents of scalar elements
#[derive(Debug)]
pub(crate) struct XmlBuilder {
    root: &'static str,
    out: String,
}

impl XmlBuilder {
    pub(crate) fn new(root: &'static str) -> Self {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push('<');
        out.push_str(root);
        out.push('>');
        Self { root, out }
    }

    /// Append an element with escaped text content
    pub(crate) fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.open(name, &[]);
        self.out.push_str(&escape(value));
        self.close(name)
    }

    /// Append an element only when a value is present
    pub(crate) fn optional_text(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.text(name, value);
        }
        self
    }

    /// Append a scalar element annotated with its type
    pub(crate) fn typed(&mut self, name: &str, value: impl Display, ty: ValueType) -> &mut Self {
        self.open(name, &[("type", ty.as_str())]);
        self.out.push_str(&value.to_string());
        self.close(name)
    }

    pub(crate) fn optional_typed<T: Display>(
        &mut self,
        name: &str,
        value: Option<T>,
        ty: ValueType,
    ) -> &mut Self {
        if let Some(value) = value {
            self.typed(name, value, ty);
        }
        self
    }

    /// Append an element whose content is a CDATA section.
    ///
    /// The caller guarantees `value` does not contain `]]>`.
    pub(crate) fn cdata(&mut self, name: &str, value: &str) -> &mut Self {
        self.open(name, &[]);
        self.out.push_str("<![CDATA[");
        self.out.push_str(value);
        self.out.push_str("]]>");
        self.close(name)
    }

    /// Append an element with attributes and escaped text
    pub(crate) fn text_with_attributes(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        value: &str,
    ) -> &mut Self {
        self.open(name, attributes);
        self.out.push_str(&escape(value));
        self.close(name)
    }

    pub(crate) fn finish(mut self) -> String {
        self.out.push_str("</");
        self.out.push_str(self.root);
        self.out.push('>');
        self.out
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(&escape(*value));
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn close(&mut self, name: &str) -> &mut Self {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        self
    }
}

#[cfg(test)]
#[path = "xml_tests.rs"]
mod tests;
