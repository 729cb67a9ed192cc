//! Namespace-aware multi-status parsing.
//!
//! The parser turns a `207 Multi-Status` body into [`DavResponse`] values
//! without interpreting any property: every element found under
//! `<d:prop>` is kept as a [`PropValue`] tree keyed by Clark notation.

use anyhow::{Result, anyhow, bail};
use hyper::body::Incoming;
use quick_xml::NsReader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use std::io::{BufRead, Cursor};
use std::mem;

use crate::common::compression::{ContentEncoding, decompress_stream};
use crate::webdav::types::{DAV_NS, DavResponse, PropStat, PropValue, XmlNode, clark_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementName {
    Multistatus,
    Response,
    Propstat,
    Prop,
    Href,
    Status,
    /// Any element inside `<d:prop>`.
    Property,
    Other,
}

fn element_from_parts(namespace: &str, local: &[u8]) -> ElementName {
    if namespace != DAV_NS {
        return ElementName::Other;
    }
    match local {
        b"multistatus" => ElementName::Multistatus,
        b"response" => ElementName::Response,
        b"propstat" => ElementName::Propstat,
        b"prop" => ElementName::Prop,
        b"href" => ElementName::Href,
        b"status" => ElementName::Status,
        _ => ElementName::Other,
    }
}

fn path_ends_with<T: PartialEq>(stack: &[T], needle: &[T]) -> bool {
    stack.len() >= needle.len() && stack[stack.len() - needle.len()..] == needle[..]
}

pub(crate) trait ResponseConsumer {
    fn consume(&mut self, response: DavResponse) -> Result<()>;
}

impl ResponseConsumer for Vec<DavResponse> {
    fn consume(&mut self, response: DavResponse) -> Result<()> {
        self.push(response);
        Ok(())
    }
}

impl<F> ResponseConsumer for F
where
    F: FnMut(DavResponse) -> Result<()>,
{
    fn consume(&mut self, response: DavResponse) -> Result<()> {
        (self)(response)
    }
}

struct NodeBuilder {
    namespace: String,
    local_name: String,
    qualified_name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl NodeBuilder {
    fn into_node(self) -> XmlNode {
        let value = if self.children.is_empty() {
            PropValue::Text(self.text.trim().to_string())
        } else {
            PropValue::Elements(self.children)
        };
        XmlNode {
            namespace: self.namespace,
            local_name: self.local_name,
            qualified_name: self.qualified_name,
            value,
        }
    }
}

struct MultistatusParser<C> {
    stack: Vec<ElementName>,
    current: DavResponse,
    propstat: PropStat,
    nodes: Vec<NodeBuilder>,
    seen_root: bool,
    sink: C,
}

impl<C: ResponseConsumer> MultistatusParser<C> {
    fn new(sink: C) -> Self {
        Self {
            stack: Vec::with_capacity(16),
            current: DavResponse::default(),
            propstat: PropStat::default(),
            nodes: Vec::new(),
            seen_root: false,
            sink,
        }
    }

    fn path_ends_with(&self, needle: &[ElementName]) -> bool {
        path_ends_with(&self.stack, needle)
    }

    fn in_property(&self) -> bool {
        !self.nodes.is_empty() || self.path_ends_with(&[ElementName::Propstat, ElementName::Prop])
    }

    fn on_start(&mut self, namespace: &str, event: &BytesStart<'_>) {
        let local = event.local_name();
        if self.in_property() {
            self.nodes.push(NodeBuilder {
                namespace: namespace.to_string(),
                local_name: String::from_utf8_lossy(local.as_ref()).into_owned(),
                qualified_name: String::from_utf8_lossy(event.name().as_ref()).into_owned(),
                text: String::new(),
                children: Vec::new(),
            });
            self.stack.push(ElementName::Property);
            return;
        }

        let element = element_from_parts(namespace, local.as_ref());
        if self.stack.is_empty() && element == ElementName::Multistatus {
            self.seen_root = true;
        }
        match element {
            ElementName::Response => self.current = DavResponse::default(),
            ElementName::Propstat => self.propstat = PropStat::default(),
            _ => {}
        }
        self.stack.push(element);
    }

    fn on_end(&mut self) -> Result<()> {
        let Some(element) = self.stack.pop() else {
            return Ok(());
        };

        match element {
            ElementName::Property => {
                if let Some(node) = self.nodes.pop() {
                    let node = node.into_node();
                    match self.nodes.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => {
                            let key = clark_name(&node.namespace, &node.local_name);
                            self.propstat.properties.insert(key, node.value);
                        }
                    }
                }
            }
            ElementName::Href if self.path_ends_with(&[ElementName::Response]) => {
                self.current.href = self.current.href.trim().to_string();
            }
            ElementName::Status if self.path_ends_with(&[ElementName::Propstat]) => {
                self.propstat.status = self.propstat.status.trim().to_string();
            }
            ElementName::Status if self.path_ends_with(&[ElementName::Response]) => {
                if let Some(status) = self.current.status.as_mut() {
                    *status = status.trim().to_string();
                }
            }
            ElementName::Propstat if self.path_ends_with(&[ElementName::Response]) => {
                let propstat = mem::take(&mut self.propstat);
                self.current.propstats.push(propstat);
            }
            ElementName::Response => {
                let finished = mem::take(&mut self.current);
                self.sink.consume(finished)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if let Some(node) = self.nodes.last_mut() {
            node.text.push_str(text);
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Href]) {
            self.current.href.push_str(text);
        } else if self.path_ends_with(&[ElementName::Propstat, ElementName::Status]) {
            self.propstat.status.push_str(text);
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Status]) {
            self.current
                .status
                .get_or_insert_with(String::new)
                .push_str(text);
        }
    }

    /// Hand back the sink once the document is complete.
    ///
    /// A body without a top-level `{DAV:}multistatus` or one that ends with
    /// open elements is rejected, so truncated or non-XML replies never pass
    /// for an empty listing.
    fn finish(self) -> Result<C> {
        if !self.stack.is_empty() {
            bail!("multi-status body ended with {} open element(s)", self.stack.len());
        }
        if !self.seen_root {
            bail!("body has no DAV:multistatus root element");
        }
        Ok(self.sink)
    }
}

fn namespace_of(resolved: &ResolveResult<'_>) -> String {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
        _ => String::new(),
    }
}

pub(crate) fn decode_text(raw: &[u8]) -> Result<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(unescape(s)
            .map_err(|err| anyhow!("XML decode error: {err}"))?
            .into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}

pub(crate) fn decode_reference(reference: &BytesRef<'_>) -> Result<String> {
    if let Some(ch) = reference
        .resolve_char_ref()
        .map_err(|err| anyhow!("XML character reference error: {err}"))?
    {
        return Ok(ch.to_string());
    }
    let name = reference
        .decode()
        .map_err(|err| anyhow!("XML decode error: {err}"))?;
    Ok(match resolve_predefined_entity(&name) {
        Some(resolved) => resolved.to_string(),
        None => format!("&{name};"),
    })
}

fn parse_multistatus_bytes_with<R, C>(reader: R, sink: C) -> Result<C>
where
    R: BufRead,
    C: ResponseConsumer,
{
    let mut xml = NsReader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new(sink);

    loop {
        match xml.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => {
                let ns = namespace_of(&ns);
                parser.on_start(&ns, &e);
            }
            Ok((ns, Event::Empty(e))) => {
                let ns = namespace_of(&ns);
                parser.on_start(&ns, &e);
                parser.on_end()?;
            }
            Ok((_, Event::End(_))) => parser.on_end()?,
            Ok((_, Event::Text(e))) => parser.on_text(&decode_text(e.as_ref())?),
            Ok((_, Event::GeneralRef(e))) => parser.on_text(&decode_reference(&e)?),
            Ok((_, Event::CData(e))) => parser.on_text(&String::from_utf8_lossy(e.as_ref())),
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(anyhow!("XML error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    parser.finish()
}

async fn parse_multistatus_stream_with<C>(
    resp_body: Incoming,
    encodings: &[ContentEncoding],
    sink: C,
) -> Result<C>
where
    C: ResponseConsumer + Send,
{
    let reader = decompress_stream(resp_body, encodings)?;
    let mut xml = NsReader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new(sink);

    loop {
        match xml.read_resolved_event_into_async(&mut buf).await {
            Ok((ns, Event::Start(e))) => {
                let ns = namespace_of(&ns);
                parser.on_start(&ns, &e);
            }
            Ok((ns, Event::Empty(e))) => {
                let ns = namespace_of(&ns);
                parser.on_start(&ns, &e);
                parser.on_end()?;
            }
            Ok((_, Event::End(_))) => parser.on_end()?,
            Ok((_, Event::Text(e))) => parser.on_text(&decode_text(e.as_ref())?),
            Ok((_, Event::GeneralRef(e))) => parser.on_text(&decode_reference(&e)?),
            Ok((_, Event::CData(e))) => parser.on_text(&String::from_utf8_lossy(e.as_ref())),
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(anyhow!("XML parsing error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    parser.finish()
}

/// Parse a `207 Multi-Status` body from an aggregated buffer.
pub fn parse_multistatus_bytes(body: &[u8]) -> Result<Vec<DavResponse>> {
    parse_multistatus_bytes_with(Cursor::new(body), Vec::<DavResponse>::new())
}

/// Parse an aggregated multi-status body and hand each response to `on_response`.
pub fn parse_multistatus_bytes_visit<F>(body: &[u8], on_response: F) -> Result<()>
where
    F: FnMut(DavResponse) -> Result<()>,
{
    parse_multistatus_bytes_with(Cursor::new(body), on_response)?;
    Ok(())
}

/// Parse a `207 Multi-Status` body in **streaming mode**, decompressing on
/// the fly (br, gzip, zstd).
pub async fn parse_multistatus_stream(
    resp_body: Incoming,
    encodings: &[ContentEncoding],
) -> Result<Vec<DavResponse>> {
    parse_multistatus_stream_with(resp_body, encodings, Vec::<DavResponse>::new()).await
}

/// Stream parse a multi-status body and invoke a callback for each response.
pub async fn parse_multistatus_stream_visit<F>(
    resp_body: Incoming,
    encodings: &[ContentEncoding],
    on_response: F,
) -> Result<()>
where
    F: FnMut(DavResponse) -> Result<()> + Send,
{
    parse_multistatus_stream_with(resp_body, encodings, on_response).await?;
    Ok(())
}

/// Extract the `<s:message>` text from a Sabre `<d:error>` body, if any.
pub fn parse_dav_error_message(body: &[u8]) -> Option<String> {
    let mut xml = NsReader::from_reader(Cursor::new(body));
    let mut buf = Vec::new();
    let mut in_message = false;
    let mut message = String::new();

    loop {
        match xml.read_resolved_event_into(&mut buf) {
            Ok((_, Event::Start(e))) => {
                in_message = e.local_name().as_ref() == b"message";
            }
            Ok((_, Event::End(_))) => {
                if in_message {
                    break;
                }
            }
            Ok((_, Event::Text(e))) if in_message => {
                message.push_str(&decode_text(e.as_ref()).ok()?);
            }
            Ok((_, Event::GeneralRef(e))) if in_message => {
                message.push_str(&decode_reference(&e).ok()?);
            }
            Ok((_, Event::Eof)) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
