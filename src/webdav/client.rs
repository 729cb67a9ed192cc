use anyhow::{Result, anyhow};
use bytes::Bytes;
use futures::{StreamExt, stream::FuturesOrdered};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri, header};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{Duration, timeout};

use crate::common::compression::{add_accept_encoding, decompress_body, detect_encodings};
use crate::common::http::{HyperClient, build_hyper_client};
use crate::error::ClientError;
use crate::session::Session;
use crate::webdav::decode::{decode_all, decode_entry};
use crate::webdav::path::{dav_url_path, normalize_path};
use crate::webdav::streaming::{
    parse_dav_error_message, parse_multistatus_bytes, parse_multistatus_stream_visit,
};
use crate::webdav::types::{BatchItem, DEFAULT_PROPERTIES, DavResponse, Depth, FileInfo, props};
use crate::webdav::xml::{
    FilterRules, build_filter_files_body, build_propfind_body, build_proppatch_body,
};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

fn properties_or_default<'a>(properties: &'a [&'a str]) -> &'a [&'a str] {
    if properties.is_empty() {
        DEFAULT_PROPERTIES
    } else {
        properties
    }
}

/// Turn a response with an unexpected status into [`ClientError::UnexpectedStatus`],
/// carrying the Sabre error message when the body has one.
pub(crate) fn expect_status(resp: &Response<Bytes>, expected: &[StatusCode]) -> Result<()> {
    if expected.contains(&resp.status()) {
        return Ok(());
    }
    Err(ClientError::UnexpectedStatus {
        status: resp.status(),
        message: parse_dav_error_message(resp.body()),
    }
    .into())
}

/// Parse an aggregated multi-status reply. Bodies that are not a complete
/// `{DAV:}multistatus` document become [`ClientError::InvalidResponseBody`].
fn parse_multistatus_reply(resp: &Response<Bytes>) -> Result<Vec<DavResponse>> {
    parse_multistatus_bytes(resp.body()).map_err(|err| {
        log::debug!("rejecting {} multi-status body: {err}", resp.status());
        ClientError::InvalidResponseBody {
            body: String::from_utf8_lossy(resp.body()).into_owned(),
        }
        .into()
    })
}

/// File API client for the instance described by a [`Session`].
///
/// Logical paths (`/docs/a.txt`) are mapped onto the session's DAV root and
/// hrefs in responses are mapped back, so callers never see
/// `remote.php/...` prefixes. Cloning is cheap and reuses the connection pool.
#[derive(Clone)]
pub struct WebDavClient {
    session: Arc<Session>,
    client: HyperClient,
    default_timeout: Duration,
}

impl WebDavClient {
    pub fn new(session: Session) -> Result<Self> {
        Ok(Self::with_client(session, build_hyper_client()?))
    }

    /// Create a client on an existing connection pool.
    pub fn with_client(session: Session, client: HyperClient) -> Self {
        Self {
            session: Arc::new(session),
            client,
            default_timeout: Duration::from_secs(20),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_timeout(&mut self, per_request: Duration) {
        self.default_timeout = per_request;
    }

    /// Resolve `path` against the instance URL. Absolute URLs pass through.
    pub fn build_uri(&self, path: &str) -> Result<Uri> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.parse()?);
        }

        let mut parts = self.session.base_url().clone().into_parts();
        let existing_path = parts
            .path_and_query
            .as_ref()
            .map(|pq| pq.path())
            .unwrap_or("/");

        let (path_only, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut combined = existing_path.trim_end_matches('/').to_string();
        combined.push('/');
        combined.push_str(path_only.trim_start_matches('/'));

        let path_and_query = match query {
            Some(q) => format!("{combined}?{q}").parse()?,
            None => combined.parse()?,
        };

        parts.path_and_query = Some(path_and_query);
        Ok(Uri::from_parts(parts)?)
    }

    /// Instance-relative, encoded URL path of a logical file path.
    pub fn dav_path(&self, path: &str) -> Result<String> {
        Ok(dav_url_path(&self.session.dav_root()?, path))
    }

    /// Absolute URL of a logical file path, as used by `Destination`.
    pub fn dav_url(&self, path: &str) -> Result<String> {
        Ok(self.build_uri(&self.dav_path(path)?)?.to_string())
    }

    fn build_request(
        &self,
        method: Method,
        uri: Uri,
        mut headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Request<Full<Bytes>>> {
        let auth = self
            .session
            .auth_header()
            .ok_or(ClientError::NotAuthenticated)?;

        add_accept_encoding(&mut headers);
        if body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static(XML_CONTENT_TYPE),
            );
        }

        let mut req_builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth);
        for (k, v) in headers.iter() {
            req_builder = req_builder.header(k, v);
        }

        Ok(req_builder.body(Full::new(body.unwrap_or_default()))?)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        per_req_timeout: Option<Duration>,
    ) -> Result<Response<Incoming>> {
        let uri = self.build_uri(path)?;
        log::debug!("{method} {uri}");
        let req = self.build_request(method, uri, headers, body)?;

        let fut = self.client.request(req);
        let resp = timeout(per_req_timeout.unwrap_or(self.default_timeout), fut)
            .await
            .map_err(|_| anyhow!("request timed out"))??;
        Ok(resp)
    }

    // ----------- Aggregated send (Bytes) with automatic decompression -----------

    /// Generic **aggregated send**: the body is collected and decompressed.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body_bytes: Option<Bytes>,
        per_req_timeout: Option<Duration>,
    ) -> Result<Response<Bytes>> {
        let resp = self
            .dispatch(method, path, headers, body_bytes, per_req_timeout)
            .await?;

        let encodings = detect_encodings(resp.headers());
        let (mut parts, body) = resp.into_parts();
        let decompressed = decompress_body(body, &encodings).await?;
        if !encodings.is_empty() {
            parts.headers.remove(header::CONTENT_ENCODING);
            parts.headers.insert(
                header::CONTENT_LENGTH,
                header::HeaderValue::from(decompressed.len()),
            );
        }
        log::trace!(
            "{} response body: {}",
            parts.status,
            String::from_utf8_lossy(&decompressed)
        );

        Ok(Response::from_parts(parts, decompressed))
    }

    // ----------- Streaming send (for parsing on the fly) -----------

    /// Generic **streaming send**. Returns a `Response<Incoming>` (not aggregated).
    pub async fn send_stream(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body_bytes: Option<Bytes>,
        per_req_timeout: Option<Duration>,
    ) -> Result<Response<Incoming>> {
        self.dispatch(method, path, headers, body_bytes, per_req_timeout)
            .await
    }

    // ----------- HTTP/WebDAV Verbs -----------

    /// Send a WebDAV `PROPFIND` with a custom XML body and `Depth` header.
    pub async fn propfind(
        &self,
        path: &str,
        depth: Depth,
        xml_body: &str,
    ) -> Result<Response<Bytes>> {
        let mut h = HeaderMap::new();
        h.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
        self.send(
            Method::from_bytes(b"PROPFIND")?,
            path,
            h,
            Some(Bytes::from(xml_body.to_owned())),
            None,
        )
        .await
    }

    /// Send a WebDAV `REPORT` with a custom XML body and optional `Depth`.
    pub async fn report(
        &self,
        path: &str,
        depth: Option<Depth>,
        xml_body: &str,
    ) -> Result<Response<Bytes>> {
        let mut h = HeaderMap::new();
        if let Some(depth) = depth {
            h.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
        }
        self.send(
            Method::from_bytes(b"REPORT")?,
            path,
            h,
            Some(Bytes::from(xml_body.to_owned())),
            None,
        )
        .await
    }

    // ----------- File operations on logical paths -----------

    /// List `path` with the given Clark-notation properties
    /// ([`DEFAULT_PROPERTIES`] when empty).
    ///
    /// With `Depth::One` the first entry is the folder itself.
    pub async fn list(
        &self,
        path: &str,
        depth: Depth,
        properties: &[&str],
    ) -> Result<Vec<FileInfo>> {
        let body = build_propfind_body(properties_or_default(properties));
        let resp = self.propfind(&self.dav_path(path)?, depth, &body).await?;
        expect_status(&resp, &[StatusCode::MULTI_STATUS])?;

        let responses = parse_multistatus_reply(&resp)?;
        Ok(decode_all(responses, self.session.left_trim_components()))
    }

    /// Metadata of a single resource.
    pub async fn file_info(&self, path: &str, properties: &[&str]) -> Result<FileInfo> {
        self.list(path, Depth::Zero, properties)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClientError::NotFound {
                    path: normalize_path(path),
                }
                .into()
            })
    }

    /// Run many [`file_info`](Self::file_info) lookups with bounded
    /// concurrency. Results keep the order of `paths`.
    pub async fn file_info_many(
        &self,
        paths: impl IntoIterator<Item = String>,
        properties: &[&str],
        max_concurrency: usize,
    ) -> Vec<BatchItem<FileInfo>> {
        let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let properties: Arc<Vec<String>> =
            Arc::new(properties.iter().map(|p| p.to_string()).collect());
        let mut tasks = FuturesOrdered::new();

        for path in paths {
            let sem = sem.clone();
            let this = self.clone();
            let properties = properties.clone();
            tasks.push_back(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        let props: Vec<&str> = properties.iter().map(String::as_str).collect();
                        this.file_info(&path, &props).await
                    }
                    Err(e) => Err(e.into()),
                };
                BatchItem {
                    pub_path: path,
                    result,
                }
            });
        }

        let mut out = Vec::new();
        while let Some(item) = tasks.next().await {
            out.push(item);
        }
        out
    }

    /// Streaming variant of [`list`](Self::list): entries are decoded while
    /// the body arrives and handed to `on_item` one by one.
    pub async fn list_stream<F>(
        &self,
        path: &str,
        depth: Depth,
        properties: &[&str],
        mut on_item: F,
    ) -> Result<()>
    where
        F: FnMut(FileInfo) -> Result<()> + Send,
    {
        let body = build_propfind_body(properties_or_default(properties));
        let mut h = HeaderMap::new();
        h.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
        let resp = self
            .send_stream(
                Method::from_bytes(b"PROPFIND")?,
                &self.dav_path(path)?,
                h,
                Some(Bytes::from(body)),
                None,
            )
            .await?;

        let encodings = detect_encodings(resp.headers());
        let (parts, body) = resp.into_parts();
        if parts.status != StatusCode::MULTI_STATUS {
            let body = decompress_body(body, &encodings).await?;
            return expect_status(
                &Response::from_parts(parts, body),
                &[StatusCode::MULTI_STATUS],
            );
        }

        let left_trim = self.session.left_trim_components();
        parse_multistatus_stream_visit(body, &encodings, |entry| {
            match decode_entry(entry, left_trim) {
                Some(info) => on_item(info),
                None => Ok(()),
            }
        })
        .await
    }

    /// Download a file.
    pub async fn get_file_contents(&self, path: &str) -> Result<Bytes> {
        let resp = self
            .send(Method::GET, &self.dav_path(path)?, HeaderMap::new(), None, None)
            .await?;
        expect_status(&resp, &[StatusCode::OK])?;
        Ok(resp.into_body())
    }

    /// Upload a file. Returns the new `ETag` when the server sends one.
    pub async fn put_file_contents(&self, path: &str, contents: Bytes) -> Result<Option<String>> {
        let mut h = HeaderMap::new();
        h.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/octet-stream"),
        );
        let resp = self
            .send(Method::PUT, &self.dav_path(path)?, h, Some(contents), None)
            .await?;
        expect_status(
            &resp,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )?;
        Ok(Self::etag_from_headers(resp.headers()))
    }

    /// Create a folder (`MKCOL`).
    pub async fn create_folder(&self, path: &str) -> Result<()> {
        let resp = self
            .send(
                Method::from_bytes(b"MKCOL")?,
                &self.dav_path(path)?,
                HeaderMap::new(),
                None,
                None,
            )
            .await?;
        expect_status(&resp, &[StatusCode::CREATED])
    }

    /// Delete a file or folder.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .send(Method::DELETE, &self.dav_path(path)?, HeaderMap::new(), None, None)
            .await?;
        expect_status(&resp, &[StatusCode::OK, StatusCode::NO_CONTENT])
    }

    async fn transfer(&self, method: &[u8], src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let mut h = HeaderMap::new();
        h.insert(
            "Destination",
            header::HeaderValue::from_str(&self.dav_url(dst)?)?,
        );
        h.insert(
            "Overwrite",
            header::HeaderValue::from_static(if overwrite { "T" } else { "F" }),
        );
        let resp = self
            .send(
                Method::from_bytes(method)?,
                &self.dav_path(src)?,
                h,
                None,
                None,
            )
            .await?;
        expect_status(&resp, &[StatusCode::CREATED, StatusCode::NO_CONTENT])
    }

    /// Move `src` to `dst` (both logical paths).
    pub async fn move_to(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        self.transfer(b"MOVE", src, dst, overwrite).await
    }

    /// Copy `src` to `dst` (both logical paths).
    pub async fn copy_to(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        self.transfer(b"COPY", src, dst, overwrite).await
    }

    /// Set dead or server-managed properties with `PROPPATCH`.
    ///
    /// Fails if any propstat in the reply is not `200 OK`.
    pub async fn set_properties(&self, path: &str, properties: &[(&str, &str)]) -> Result<()> {
        let body = build_proppatch_body(properties);
        let resp = self
            .send(
                Method::from_bytes(b"PROPPATCH")?,
                &self.dav_path(path)?,
                HeaderMap::new(),
                Some(Bytes::from(body)),
                None,
            )
            .await?;
        expect_status(&resp, &[StatusCode::MULTI_STATUS])?;

        for response in parse_multistatus_reply(&resp)? {
            if let Some(failed) = response.propstats.iter().find(|ps| !ps.is_ok()) {
                let mut keys: Vec<&str> = failed.properties.keys().map(String::as_str).collect();
                keys.sort_unstable();
                return Err(anyhow!(
                    "property update rejected with {:?}: {}",
                    failed.status,
                    keys.join(", ")
                ));
            }
        }
        Ok(())
    }

    /// Mark or unmark a file as favorite.
    pub async fn set_favorite(&self, path: &str, favorite: bool) -> Result<()> {
        self.set_properties(path, &[(props::FAVORITE, if favorite { "1" } else { "0" })])
            .await
    }

    /// Files under `path` matching `rules` (favorites, system tags).
    pub async fn filter_files(
        &self,
        path: &str,
        rules: &FilterRules,
        properties: &[&str],
    ) -> Result<Vec<FileInfo>> {
        if rules.is_empty() {
            return Err(anyhow!("filter-files needs at least one rule"));
        }
        let body = build_filter_files_body(rules, properties_or_default(properties));
        let resp = self.report(&self.dav_path(path)?, None, &body).await?;
        expect_status(&resp, &[StatusCode::MULTI_STATUS])?;

        let responses = parse_multistatus_reply(&resp)?;
        Ok(decode_all(responses, self.session.left_trim_components()))
    }

    /// Logical path of the file with the given file id.
    pub async fn path_for_file_id(&self, file_id: &str) -> Result<String> {
        let body = build_propfind_body(&[props::META_PATH_FOR_USER]);
        let meta_path = dav_url_path("remote.php/dav/meta", file_id);
        let resp = self.propfind(&meta_path, Depth::Zero, &body).await?;
        expect_status(&resp, &[StatusCode::MULTI_STATUS])?;

        decode_all(parse_multistatus_reply(&resp)?, 0)
            .into_iter()
            .find_map(|info| {
                info.text_property(props::META_PATH_FOR_USER)
                    .filter(|p| !p.is_empty())
                    .map(normalize_path)
            })
            .ok_or_else(|| ClientError::NotFound { path: meta_path }.into())
    }

    /// Extract the `ETag` from a response header map, if present.
    pub fn etag_from_headers(headers: &HeaderMap) -> Option<String> {
        headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}
