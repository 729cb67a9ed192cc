pub mod client;
pub mod decode;
pub mod path;
pub mod streaming;
pub mod types;
pub mod xml;

pub use client::WebDavClient;
pub use decode::{decode_all, decode_entry};
pub use path::{dav_url_path, encode_uri_path, normalize_path, resolve_path};
pub use streaming::{
    parse_dav_error_message, parse_multistatus_bytes, parse_multistatus_bytes_visit,
    parse_multistatus_stream, parse_multistatus_stream_visit,
};
pub use types::{
    BatchItem, DAV_NS, DEFAULT_PROPERTIES, DavResponse, Depth, FileInfo, FileType, NC_NS, OC_NS,
    PropStat, PropValue, Properties, STATUS_OK, XmlNode, clark_name, props, split_clark_name,
};
pub use xml::{
    FilterRules, build_filter_files_body, build_propfind_body, build_proppatch_body, escape_xml,
};
