use crate::webdav::types::{DAV_NS, NC_NS, OC_NS, split_clark_name};

/// Escape `& < > " '` for XML text and attribute values.
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Prefix allocation for the namespaces used in a request body.
struct Namespaces {
    entries: Vec<(String, String)>,
}

impl Namespaces {
    fn new() -> Self {
        Self {
            entries: vec![
                (DAV_NS.to_string(), "d".to_string()),
                (OC_NS.to_string(), "oc".to_string()),
                (NC_NS.to_string(), "nc".to_string()),
            ],
        }
    }

    fn prefix_for(&mut self, namespace: &str) -> String {
        if let Some((_, prefix)) = self.entries.iter().find(|(ns, _)| ns == namespace) {
            return prefix.clone();
        }
        let prefix = format!("x{}", self.entries.len() - 3);
        self.entries.push((namespace.to_string(), prefix.clone()));
        prefix
    }

    /// Qualified element name for a Clark key. Keys without a namespace
    /// land in `DAV:`.
    fn qualify(&mut self, key: &str) -> String {
        let (ns, local) = split_clark_name(key);
        let ns = if ns.is_empty() { DAV_NS } else { ns };
        format!("{}:{}", self.prefix_for(ns), local)
    }

    fn declarations(&self) -> String {
        self.entries
            .iter()
            .map(|(ns, prefix)| format!(r#" xmlns:{prefix}="{}""#, escape_xml(ns)))
            .collect()
    }
}

fn prop_list(ns: &mut Namespaces, properties: &[&str]) -> String {
    let mut body = String::from("<d:prop>");
    for key in properties {
        body.push('<');
        body.push_str(&ns.qualify(key));
        body.push_str("/>");
    }
    body.push_str("</d:prop>");
    body
}

/// Build a `PROPFIND` body for Clark-notation property keys.
///
/// An empty list requests `<d:allprop/>`.
pub fn build_propfind_body(properties: &[&str]) -> String {
    let mut ns = Namespaces::new();
    let inner = if properties.is_empty() {
        "<d:allprop/>".to_string()
    } else {
        prop_list(&mut ns, properties)
    };
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><d:propfind{}>{inner}</d:propfind>"#,
        ns.declarations()
    )
}

/// Build a `PROPPATCH` body setting each `(key, value)` pair.
pub fn build_proppatch_body(properties: &[(&str, &str)]) -> String {
    let mut ns = Namespaces::new();
    let mut inner = String::from("<d:set><d:prop>");
    for (key, value) in properties {
        let name = ns.qualify(key);
        inner.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }
    inner.push_str("</d:prop></d:set>");
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><d:propertyupdate{}>{inner}</d:propertyupdate>"#,
        ns.declarations()
    )
}

/// Rules for an `oc:filter-files` REPORT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRules {
    pub favorites: bool,
    pub system_tag_ids: Vec<String>,
}

impl FilterRules {
    pub fn favorites() -> Self {
        Self {
            favorites: true,
            ..Self::default()
        }
    }

    pub fn with_system_tag(mut self, tag_id: impl Into<String>) -> Self {
        self.system_tag_ids.push(tag_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.favorites && self.system_tag_ids.is_empty()
    }
}

/// Build the `oc:filter-files` REPORT body used for favorites and tag filters.
pub fn build_filter_files_body(rules: &FilterRules, properties: &[&str]) -> String {
    let mut ns = Namespaces::new();
    let mut inner = String::new();
    if !properties.is_empty() {
        inner.push_str(&prop_list(&mut ns, properties));
    }
    inner.push_str("<oc:filter-rules>");
    if rules.favorites {
        inner.push_str("<oc:favorite>1</oc:favorite>");
    }
    for tag in &rules.system_tag_ids {
        inner.push_str("<oc:systemtag>");
        inner.push_str(&escape_xml(tag));
        inner.push_str("</oc:systemtag>");
    }
    inner.push_str("</oc:filter-rules>");
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><oc:filter-files{}>{inner}</oc:filter-files>"#,
        ns.declarations()
    )
}
