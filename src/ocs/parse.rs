use anyhow::{Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use std::io::Cursor;

use crate::error::ClientError;
use crate::webdav::streaming::{decode_reference, decode_text};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse an OCS reply into a generic envelope.
///
/// A leading UTF-8 byte order mark is skipped. Bodies starting with `<` are
/// read as XML, anything else as JSON. XML is mapped onto the JSON shape
/// (see [`xml_to_value`]) so both formats look like `{"ocs": {"meta": {...}, "data": ...}}`.
pub fn parse_body(body: &[u8]) -> Result<Value, ClientError> {
    let text = String::from_utf8_lossy(body);
    let content = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let parsed = if content.trim_ascii_start().starts_with(b"<") {
        xml_to_value(content).map_err(|err| log::debug!("XML body rejected: {err}"))
    } else {
        serde_json::from_slice::<Value>(content)
            .map_err(|err| log::debug!("JSON body rejected: {err}"))
    };

    parsed.map_err(|_| ClientError::InvalidResponseBody {
        body: text.into_owned(),
    })
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_entry(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::String(self.text.trim().to_string())
        } else {
            Value::Object(self.children)
        };
        (self.name, value)
    }
}

fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

/// Convert an XML document into a JSON value.
///
/// Elements with children become objects, repeated children become arrays,
/// leaf elements become (trimmed) strings and attributes are dropped. A
/// list with a single `<element>` therefore decodes as an object, not an
/// array.
pub fn xml_to_value(body: &[u8]) -> Result<Value> {
    let mut xml = Reader::from_reader(Cursor::new(body));
    xml.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    let mut attach = |stack: &mut Vec<Frame>, name: String, value: Value| -> Result<()> {
        match stack.last_mut() {
            Some(parent) => insert_child(&mut parent.children, name, value),
            None if root.is_none() => root = Some((name, value)),
            None => bail!("more than one root element"),
        }
        Ok(())
    };

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                attach(&mut stack, name, Value::String(String::new()))?;
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced closing tag"))?;
                let (name, value) = frame.into_entry();
                attach(&mut stack, name, value)?;
            }
            Ok(Event::Text(e)) => {
                let text = decode_text(e.as_ref())?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => bail!("text outside of the root element"),
                }
            }
            Ok(Event::GeneralRef(e)) => {
                let text = decode_reference(&e)?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None => bail!("text outside of the root element"),
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("XML error: {e}"),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        bail!("unexpected end of document inside <{}>", stack[stack.len() - 1].name);
    }

    let (name, value) = root.ok_or_else(|| anyhow!("document has no root element"))?;
    let mut out = Map::new();
    out.insert(name, value);
    Ok(Value::Object(out))
}

/// Turn `"true"` / `"false"` strings into booleans, one level deep.
///
/// Any other value, including nested objects, is left as is.
pub fn coerce_booleans(map: &mut Map<String, Value>) {
    for value in map.values_mut() {
        let coerced = match value.as_str() {
            Some("true") => true,
            Some("false") => false,
            _ => continue,
        };
        *value = Value::Bool(coerced);
    }
}
