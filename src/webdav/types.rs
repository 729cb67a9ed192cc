use anyhow::Result;
use std::collections::HashMap;

/// WebDAV Depth
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}
impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// Annotated result of a batch operation
pub struct BatchItem<T> {
    pub pub_path: String,
    pub result: Result<T>,
}

pub const DAV_NS: &str = "DAV:";
pub const OC_NS: &str = "http://owncloud.org/ns";
pub const NC_NS: &str = "http://nextcloud.org/ns";

/// Well-known property keys in Clark notation.
pub mod props {
    pub const RESOURCETYPE: &str = "{DAV:}resourcetype";
    pub const GETCONTENTLENGTH: &str = "{DAV:}getcontentlength";
    pub const GETCONTENTTYPE: &str = "{DAV:}getcontenttype";
    pub const GETETAG: &str = "{DAV:}getetag";
    pub const GETLASTMODIFIED: &str = "{DAV:}getlastmodified";
    pub const DISPLAYNAME: &str = "{DAV:}displayname";
    pub const QUOTA_AVAILABLE_BYTES: &str = "{DAV:}quota-available-bytes";
    pub const QUOTA_USED_BYTES: &str = "{DAV:}quota-used-bytes";
    pub const FILEID: &str = "{http://owncloud.org/ns}fileid";
    pub const SIZE: &str = "{http://owncloud.org/ns}size";
    pub const PERMISSIONS: &str = "{http://owncloud.org/ns}permissions";
    pub const FAVORITE: &str = "{http://owncloud.org/ns}favorite";
    pub const SHARE_TYPES: &str = "{http://owncloud.org/ns}share-types";
    pub const OWNER_ID: &str = "{http://owncloud.org/ns}owner-id";
    pub const OWNER_DISPLAY_NAME: &str = "{http://owncloud.org/ns}owner-display-name";
    pub const META_PATH_FOR_USER: &str = "{http://owncloud.org/ns}meta-path-for-user";
    pub const HAS_PREVIEW: &str = "{http://nextcloud.org/ns}has-preview";
}

/// Properties requested by the listing helpers when the caller passes none.
pub const DEFAULT_PROPERTIES: &[&str] = &[
    props::RESOURCETYPE,
    props::GETCONTENTLENGTH,
    props::GETCONTENTTYPE,
    props::GETETAG,
    props::GETLASTMODIFIED,
    props::FILEID,
    props::SIZE,
    props::PERMISSIONS,
    props::FAVORITE,
];

/// Build the Clark-notation key (`{namespace}local`) for a property.
pub fn clark_name(namespace: &str, local_name: &str) -> String {
    if namespace.is_empty() {
        local_name.to_string()
    } else {
        format!("{{{namespace}}}{local_name}")
    }
}

/// Split a Clark-notation key into `(namespace, local)`.
pub fn split_clark_name(key: &str) -> (&str, &str) {
    if let Some(rest) = key.strip_prefix('{')
        && let Some((ns, local)) = rest.split_once('}')
    {
        return (ns, local);
    }
    ("", key)
}

/// Decoded value of a WebDAV property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Text content. Empty elements decode to an empty string.
    Text(String),
    /// Child elements, in document order.
    Elements(Vec<XmlNode>),
}

impl PropValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(t) => Some(t),
            PropValue::Elements(_) => None,
        }
    }

    pub fn elements(&self) -> &[XmlNode] {
        match self {
            PropValue::Text(_) => &[],
            PropValue::Elements(nodes) => nodes,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PropValue::Text(t) => t.is_empty(),
            PropValue::Elements(nodes) => nodes.is_empty(),
        }
    }
}

/// A nested XML element inside a property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Resolved namespace URI (empty when unbound).
    pub namespace: String,
    pub local_name: String,
    /// Raw `prefix:local` name as written by the server.
    pub qualified_name: String,
    pub value: PropValue,
}

impl XmlNode {
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace == namespace && self.local_name == local_name
    }
}

/// Property map keyed by Clark notation.
pub type Properties = HashMap<String, PropValue>;

/// One `<d:propstat>` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropStat {
    pub status: String,
    pub properties: Properties,
}

impl PropStat {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

pub const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// One `<d:response>` of a multi-status body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DavResponse {
    pub href: String,
    /// Response-level `<d:status>`, used by servers for whole-resource errors.
    pub status: Option<String>,
    pub propstats: Vec<PropStat>,
}

/// Kind of resource a [`FileInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Dir => "dir",
        }
    }
}

/// Metadata of one file or directory, decoded from a multi-status entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    name: String,
    file_type: FileType,
    properties: Properties,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, file_type: FileType, properties: Properties) -> Self {
        Self {
            name: name.into(),
            file_type,
            properties,
        }
    }

    /// Logical path of the resource, e.g. `/docs/report.pdf`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment; `/` for the root.
    pub fn base_name(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((_, base)) => base,
            None if trimmed.is_empty() => "/",
            None => trimmed,
        }
    }

    /// Directory containing the resource, with a trailing `/`.
    pub fn parent_path(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => &self.name[..=idx],
            None => "/",
        }
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn into_properties(self) -> Properties {
        self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropValue> {
        self.properties.get(key)
    }

    /// Text value of a property; `None` when absent or structured.
    pub fn text_property(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(PropValue::as_text)
    }

    /// `{DAV:}getcontentlength`, or `{oc}size` for directories.
    pub fn size(&self) -> Option<u64> {
        self.text_property(props::GETCONTENTLENGTH)
            .or_else(|| self.text_property(props::SIZE))
            .and_then(|s| s.parse().ok())
    }

    pub fn etag(&self) -> Option<&str> {
        self.text_property(props::GETETAG)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.text_property(props::GETCONTENTTYPE)
    }

    /// Raw `getlastmodified` value (RFC 1123 date).
    pub fn last_modified(&self) -> Option<&str> {
        self.text_property(props::GETLASTMODIFIED)
    }

    pub fn file_id(&self) -> Option<&str> {
        self.text_property(props::FILEID)
    }

    pub fn is_favorite(&self) -> bool {
        matches!(self.text_property(props::FAVORITE), Some("1") | Some("true"))
    }
}
