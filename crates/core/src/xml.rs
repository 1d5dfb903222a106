//! XML ↔ JSON conversion.
//!
//! An element maps to `{tag: value}` where `value` is:
//!
//! - `null` for an empty element,
//! - a string for an element with only text,
//! - otherwise an object holding attributes under `@name`, text under `#text`
//!   and children under their tag name (repeated siblings become an array).
//!
//! Parsing rejects DOCTYPE declarations, so no entity is ever expanded, and
//! stops with an error once the depth or element-count limit is exceeded.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::delimited::cell_text;
use crate::error::{ConvertError, Result};
use crate::json::{parse_json, to_json_text};
use crate::limits::Limits;

pub const ATTRIBUTE_PREFIX: char = '@';
pub const TEXT_KEY: &str = "#text";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct XmlToJsonOptions {
    pub pretty: bool,
    /// Lower the configured depth ceiling for this request.
    pub max_depth: Option<usize>,
    /// Lower the configured element-count ceiling for this request.
    pub max_nodes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonToXmlOptions {
    /// Document element used when the input has no single natural root.
    pub root_tag: String,
    pub pretty: bool,
}

impl Default for JsonToXmlOptions {
    fn default() -> Self {
        Self {
            root_tag: "root".to_string(),
            pretty: true,
        }
    }
}

#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn open(tag: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in tag.attributes() {
            let attribute = attribute
                .map_err(|e| ConvertError::Malformed(format!("Invalid XML attribute in <{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .decode_and_unescape_value(reader)
                .map_err(|e| ConvertError::Malformed(format!("Invalid XML attribute '{key}': {e}")))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn into_value(self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            };
        }

        let mut map = Map::new();
        for (key, value) in self.attributes {
            map.insert(format!("{ATTRIBUTE_PREFIX}{key}"), Value::String(value));
        }
        if !self.text.is_empty() {
            map.insert(TEXT_KEY.to_string(), Value::String(self.text));
        }
        for child in self.children {
            let name = child.name.clone();
            let value = child.into_value();
            match map.get_mut(&name) {
                // Element values are never arrays, so an array here is a run of siblings.
                Some(Value::Array(siblings)) => siblings.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(name, value);
                }
            }
        }
        Value::Object(map)
    }
}

struct TreeBuilder {
    stack: Vec<Element>,
    root: Option<Element>,
    nodes: usize,
    max_depth: usize,
    max_nodes: usize,
}

impl TreeBuilder {
    fn start(&mut self, element: Element) -> Result<()> {
        if self.root.is_some() {
            return Err(ConvertError::Malformed(
                "XML has more than one document element".to_string(),
            ));
        }
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            return Err(ConvertError::SizeLimit(format!(
                "XML is too large (more than {} elements)",
                self.max_nodes
            )));
        }
        if self.stack.len() + 1 > self.max_depth {
            return Err(ConvertError::DepthLimit(format!(
                "XML nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        self.stack.push(element);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| ConvertError::Malformed("Unexpected closing tag".to_string()))?;
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(current) => current.push_text(text),
            None if text.trim().is_empty() => {}
            None => {
                return Err(ConvertError::Malformed(
                    "Text found outside the document element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Element> {
        if !self.stack.is_empty() {
            return Err(ConvertError::Malformed(
                "Unexpected end of XML document".to_string(),
            ));
        }
        self.root
            .ok_or_else(|| ConvertError::Malformed("XML has no document element".to_string()))
    }
}

/// Parse XML into `{root_tag: value}`.
pub fn parse_xml(input: &str, max_depth: usize, max_nodes: usize) -> Result<Value> {
    let mut reader = Reader::from_str(input);
    let mut buf = Vec::new();
    let mut builder = TreeBuilder {
        stack: Vec::new(),
        root: None,
        nodes: 0,
        max_depth,
        max_nodes,
    };

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ConvertError::Malformed(format!(
                "Invalid XML at position {}: {e}",
                reader.buffer_position()
            ))
        });

        match event? {
            Event::DocType(_) => {
                return Err(ConvertError::Malformed(
                    "DOCTYPE declarations are not allowed".to_string(),
                ))
            }
            Event::Start(tag) => builder.start(Element::open(&tag, &reader)?)?,
            Event::Empty(tag) => {
                builder.start(Element::open(&tag, &reader)?)?;
                builder.end()?;
            }
            Event::End(_) => builder.end()?,
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ConvertError::Malformed(format!("Invalid XML text: {e}")))?;
                builder.text(&text)?;
            }
            Event::CData(data) => {
                let data = data.into_inner();
                builder.text(&String::from_utf8_lossy(&data))?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let root = builder.finish()?;
    let mut document = Map::new();
    let name = root.name.clone();
    document.insert(name, root.into_value());
    Ok(Value::Object(document))
}

/// Convert an XML document to JSON text.
pub fn xml_to_json(input: &str, options: &XmlToJsonOptions, limits: &Limits) -> Result<String> {
    let max_depth = Limits::lowered(limits.xml_max_depth, options.max_depth);
    let max_nodes = Limits::lowered(limits.xml_max_nodes, options.max_nodes);
    let value = parse_xml(input, max_depth, max_nodes)?;
    to_json_text(&value, options.pretty)
}

/// Convert JSON text to an XML document.
///
/// A mapping with a single non-reserved key whose value is not an array
/// supplies its own document element; anything else is wrapped in
/// `root_tag`.
pub fn json_to_xml(input: &str, options: &JsonToXmlOptions, limits: &Limits) -> Result<String> {
    let value = parse_json(input, limits)?;
    validate_name(&options.root_tag)?;

    let mut writer = XmlWriter {
        out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"),
        pretty: options.pretty,
    };
    writer.newline();

    match single_root(&value) {
        Some((name, inner)) => writer.element(name, inner, 0)?,
        None => writer.element(&options.root_tag, &value, 0)?,
    }
    Ok(writer.out)
}

fn single_root(value: &Value) -> Option<(&str, &Value)> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    if key.starts_with(ATTRIBUTE_PREFIX) || key == TEXT_KEY || inner.is_array() {
        return None;
    }
    Some((key.as_str(), inner))
}

/// Namespace prefixes are kept verbatim, so `:` is accepted anywhere a letter is.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || matches!(first, '_' | ':') => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConvertError::Malformed(format!("'{name}' is not a valid XML name")))
    }
}

struct XmlWriter {
    out: String,
    pretty: bool,
}

impl XmlWriter {
    fn newline(&mut self) {
        if self.pretty {
            self.out.push('\n');
        }
    }

    fn indent(&mut self, depth: usize) {
        if self.pretty {
            self.out.push_str(&"  ".repeat(depth));
        }
    }

    fn element(&mut self, name: &str, value: &Value, depth: usize) -> Result<()> {
        validate_name(name)?;

        let mut attributes = String::new();
        let mut text = String::new();
        let mut children: Vec<(&str, &Value)> = Vec::new();

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                        validate_name(attribute)?;
                        attributes.push_str(&format!(
                            " {attribute}=\"{}\"",
                            escape(cell_text(child).as_str())
                        ));
                    } else if key == TEXT_KEY {
                        text = cell_text(child);
                    } else if let Value::Array(items) = child {
                        children.extend(items.iter().map(|item| (key.as_str(), item)));
                    } else {
                        children.push((key.as_str(), child));
                    }
                }
            }
            Value::Array(items) => children.extend(items.iter().map(|item| ("item", item))),
            scalar => text = cell_text(scalar),
        }

        self.indent(depth);
        self.out.push_str(&format!("<{name}{attributes}"));
        if text.is_empty() && children.is_empty() {
            self.out.push_str("/>");
            self.newline();
            return Ok(());
        }

        self.out.push('>');
        self.out.push_str(&escape(text.as_str()));
        if !children.is_empty() {
            self.newline();
            for (child_name, child) in children {
                self.element(child_name, child, depth + 1)?;
            }
            self.indent(depth);
        }
        self.out.push_str(&format!("</{name}>"));
        self.newline();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(input: &str) -> Value {
        let out = xml_to_json(input, &XmlToJsonOptions::default(), &Limits::default()).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_xml_to_json_structure() {
        let value = to_value(
            r#"<library name="city">
                 <book id="1"><title>Dune</title></book>
                 <book id="2"><title>Emma</title></book>
                 <note>open &amp; free</note>
                 <empty/>
               </library>"#,
        );
        assert_eq!(
            value,
            json!({
                "library": {
                    "@name": "city",
                    "book": [
                        {"@id": "1", "title": "Dune"},
                        {"@id": "2", "title": "Emma"}
                    ],
                    "note": "open & free",
                    "empty": null
                }
            })
        );
    }

    #[test]
    fn test_xml_to_json_text_with_attributes() {
        let value = to_value(r#"<price currency="EUR"> 12.50 </price>"#);
        assert_eq!(value, json!({"price": {"@currency": "EUR", "#text": "12.50"}}));
    }

    #[test]
    fn test_xml_to_json_cdata() {
        let value = to_value("<a><![CDATA[<raw>]]></a>");
        assert_eq!(value, json!({"a": "<raw>"}));
    }

    #[test]
    fn test_xml_to_json_key_order_follows_document() {
        let out = xml_to_json("<r><z>1</z><a>2</a></r>", &XmlToJsonOptions::default(), &Limits::default())
            .unwrap();
        assert_eq!(out, r#"{"r":{"z":"1","a":"2"}}"#);
    }

    #[test]
    fn test_xml_rejects_doctype() {
        let input = r#"<?xml version="1.0"?>
            <!DOCTYPE lolz [<!ENTITY lol "lol"><!ENTITY lol2 "&lol;&lol;&lol;">]>
            <lolz>&lol2;</lolz>"#;
        let err = xml_to_json(input, &XmlToJsonOptions::default(), &Limits::default()).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
        assert!(err.to_string().contains("DOCTYPE"));
    }

    #[test]
    fn test_xml_depth_limit() {
        let depth = 40;
        let input = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let err = xml_to_json(&input, &XmlToJsonOptions::default(), &Limits::default()).unwrap_err();
        assert_eq!(err.kind(), "depth_limit");
    }

    #[test]
    fn test_xml_depth_at_limit_passes() {
        let input = format!("{}{}", "<a>".repeat(32), "</a>".repeat(32));
        assert!(xml_to_json(&input, &XmlToJsonOptions::default(), &Limits::default()).is_ok());
    }

    #[test]
    fn test_xml_request_can_lower_depth_but_not_raise_it() {
        let input = "<a><b><c/></b></a>";
        let lowered = XmlToJsonOptions {
            max_depth: Some(2),
            ..Default::default()
        };
        assert_eq!(
            xml_to_json(input, &lowered, &Limits::default()).unwrap_err().kind(),
            "depth_limit"
        );

        let deep = format!("{}{}", "<a>".repeat(40), "</a>".repeat(40));
        let raised = XmlToJsonOptions {
            max_depth: Some(1_000),
            ..Default::default()
        };
        assert_eq!(
            xml_to_json(&deep, &raised, &Limits::default()).unwrap_err().kind(),
            "depth_limit"
        );
    }

    #[test]
    fn test_xml_node_limit() {
        let input = format!("<r>{}</r>", "<i/>".repeat(20));
        let limits = Limits {
            xml_max_nodes: 10,
            ..Default::default()
        };
        let err = xml_to_json(&input, &XmlToJsonOptions::default(), &limits).unwrap_err();
        assert_eq!(err.kind(), "size_limit");
    }

    #[test]
    fn test_xml_malformed() {
        for input in ["<a><b></a>", "<a>", "", "just text", "<a/><b/>"] {
            let err = xml_to_json(input, &XmlToJsonOptions::default(), &Limits::default()).unwrap_err();
            assert_eq!(err.kind(), "malformed_input", "input: {input:?}");
        }
    }

    #[test]
    fn test_json_to_xml_single_root() {
        let out = json_to_xml(
            r#"{"book":{"@id":"7","title":"Dune","tag":["a","b"],"missing":null}}"#,
            &JsonToXmlOptions::default(),
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <book id=\"7\">\n\
             \x20 <title>Dune</title>\n\
             \x20 <tag>a</tag>\n\
             \x20 <tag>b</tag>\n\
             \x20 <missing/>\n\
             </book>\n"
        );
    }

    #[test]
    fn test_json_to_xml_bare_sequence_uses_root_tag() {
        let options = JsonToXmlOptions {
            root_tag: "rows".to_string(),
            pretty: false,
        };
        let out = json_to_xml(r#"[1,"x & y",true]"#, &options, &Limits::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rows><item>1</item><item>x &amp; y</item><item>true</item></rows>"
        );
    }

    #[test]
    fn test_json_to_xml_multi_key_object_is_wrapped() {
        let options = JsonToXmlOptions {
            pretty: false,
            ..Default::default()
        };
        let out = json_to_xml(r#"{"a":"1","b":"2"}"#, &options, &Limits::default()).unwrap();
        assert!(out.ends_with("<root><a>1</a><b>2</b></root>"));
    }

    #[test]
    fn test_json_to_xml_rejects_invalid_names() {
        let err = json_to_xml(r#"{"first name":"x"}"#, &JsonToXmlOptions::default(), &Limits::default())
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_input");

        let options = JsonToXmlOptions {
            root_tag: "1root".to_string(),
            ..Default::default()
        };
        assert!(json_to_xml("[]", &options, &Limits::default()).is_err());
    }

    #[test]
    fn test_json_xml_json_round_trip() {
        let original = json!({
            "catalog": {
                "@version": "2",
                "product": [
                    {"@sku": "A1", "name": "Lamp", "tags": {"tag": ["home", "light"]}},
                    {"@sku": "B2", "name": "Desk", "note": {"@lang": "en", "#text": "oak"}}
                ],
                "owner": "Ada",
                "archived": null
            }
        });

        for pretty in [true, false] {
            let options = JsonToXmlOptions {
                pretty,
                ..Default::default()
            };
            let xml = json_to_xml(&original.to_string(), &options, &Limits::default()).unwrap();
            assert_eq!(to_value(&xml), original, "pretty: {pretty}");
        }
    }

    #[test]
    fn test_namespaced_document_round_trip() {
        let input = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>hi</soap:Body></soap:Envelope>"#;
        let first = xml_to_json(input, &XmlToJsonOptions::default(), &Limits::default()).unwrap();
        let parsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(
            parsed,
            json!({
                "soap:Envelope": {
                    "@xmlns:soap": "http://schemas.xmlsoap.org/soap/envelope/",
                    "soap:Body": "hi"
                }
            })
        );

        let xml = json_to_xml(&first, &JsonToXmlOptions::default(), &Limits::default()).unwrap();
        let second = xml_to_json(&xml, &XmlToJsonOptions::default(), &Limits::default()).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_xml_attribute_entities_are_unescaped() {
        assert_eq!(
            to_value(r#"<a title="Fish &amp; Chips"/>"#),
            json!({"a": {"@title": "Fish & Chips"}})
        );
    }
}
