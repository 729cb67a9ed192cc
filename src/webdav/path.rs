use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::borrow::Cow;

/// Characters left untouched by `encodeURIComponent`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const REMOTE_ENDPOINT: &str = "remote.php";
const DAV_ENDPOINTS: [&str; 2] = ["webdav", "dav"];

fn decode_segment(segment: &str) -> Cow<'_, str> {
    percent_decode_str(segment).decode_utf8_lossy()
}

/// Extract the logical resource path from a server href.
///
/// The href must contain a `remote.php` segment followed by `webdav` or
/// `dav`. `left_trim_components` further segments are skipped after that
/// (e.g. `files/{user}` for the `dav` endpoint). Every kept segment is
/// percent-decoded individually.
///
/// Returns `None` when the href is outside a recognized remote endpoint and
/// `Some("")` when nothing follows the skipped prefix.
///
/// ```
/// use ocs_dav_rs::webdav::resolve_path;
///
/// assert_eq!(
///     resolve_path("/remote.php/webdav/a/b%20c.txt", 0).as_deref(),
///     Some("/a/b c.txt"),
/// );
/// assert_eq!(
///     resolve_path("/remote.php/dav/files/alice/x", 2).as_deref(),
///     Some("/x"),
/// );
/// assert_eq!(resolve_path("/index.php/apps/files", 0), None);
/// ```
pub fn resolve_path(href: &str, left_trim_components: usize) -> Option<String> {
    let segments: Vec<&str> = href.split('/').filter(|s| !s.is_empty()).collect();

    let idx = segments
        .iter()
        .position(|s| decode_segment(s) == REMOTE_ENDPOINT)?;

    let variant = decode_segment(segments.get(idx + 1)?);
    if !DAV_ENDPOINTS.contains(&variant.as_ref()) {
        return None;
    }

    let start = idx.saturating_add(left_trim_components).saturating_add(2);
    let rest = segments.get(start..).unwrap_or_default();

    let mut out = String::new();
    for segment in rest {
        out.push('/');
        out.push_str(&decode_segment(segment));
    }
    Some(out)
}

/// Ensure a leading `/`. The empty string becomes `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Normalize `path` and percent-encode each segment, keeping `/` as the delimiter.
pub fn encode_uri_path(path: &str) -> String {
    normalize_path(path)
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a DAV root (e.g. `remote.php/webdav`) and a logical path into an
/// encoded, instance-relative URL path.
pub fn dav_url_path(dav_root: &str, path: &str) -> String {
    let root = dav_root.trim_matches('/');
    format!("/{root}{}", encode_uri_path(path))
}
