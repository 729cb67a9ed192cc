use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;

/// Hyper client shared by the WebDAV and OCS clients.
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Build a pooled HTTP/1.1 + HTTP/2 client whose TLS connector prefers the
/// native roots and falls back to the bundled WebPKI store.
pub fn build_hyper_client() -> Result<HyperClient> {
    let https_builder = HttpsConnectorBuilder::new()
        .with_native_roots()
        .unwrap_or_else(|err| {
            log::warn!("native TLS roots unavailable, using webpki roots: {err}");
            HttpsConnectorBuilder::new().with_webpki_roots()
        });

    let https = https_builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(32)
        .build::<_, Full<Bytes>>(https))
}
