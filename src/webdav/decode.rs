use crate::webdav::path::{normalize_path, resolve_path};
use crate::webdav::types::{DAV_NS, DavResponse, FileInfo, FileType, PropValue, props};

/// Decode one multi-status response into a [`FileInfo`].
///
/// Returns `None` (and logs at debug level) when the href is outside the
/// remote DAV namespace or when the first propstat block is missing or not
/// `HTTP/1.1 200 OK`. Later propstat blocks, typically the `404` list of
/// unknown properties, are ignored.
pub fn decode_entry(entry: DavResponse, left_trim_components: usize) -> Option<FileInfo> {
    let Some(path) = resolve_path(&entry.href, left_trim_components) else {
        log::debug!("dropping entry outside the DAV namespace: {}", entry.href);
        return None;
    };

    let Some(propstat) = entry.propstats.into_iter().next() else {
        log::debug!("dropping entry without propstat: {}", entry.href);
        return None;
    };
    if !propstat.is_ok() {
        log::debug!(
            "dropping entry {} with property status {:?}",
            entry.href,
            propstat.status
        );
        return None;
    }

    let file_type = match propstat.properties.get(props::RESOURCETYPE) {
        Some(value) if is_collection(value) => FileType::Dir,
        _ => FileType::File,
    };

    Some(FileInfo::new(
        normalize_path(&path),
        file_type,
        propstat.properties,
    ))
}

fn is_collection(resourcetype: &PropValue) -> bool {
    resourcetype
        .elements()
        .first()
        .is_some_and(|node| node.is(DAV_NS, "collection"))
}

/// Decode every response, in order, skipping the ones [`decode_entry`] rejects.
///
/// A single response can be passed as `Some(entry)` or `[entry]`.
pub fn decode_all<I>(responses: I, left_trim_components: usize) -> Vec<FileInfo>
where
    I: IntoIterator<Item = DavResponse>,
{
    responses
        .into_iter()
        .filter_map(|entry| decode_entry(entry, left_trim_components))
        .collect()
}
