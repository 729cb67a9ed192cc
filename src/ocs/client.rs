use anyhow::Result;
use bytes::Bytes;
use hyper::{HeaderMap, Method, header};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Duration;

use crate::error::ClientError;
use crate::ocs::parse::parse_body;
use crate::ocs::status::ensure_status;
use crate::ocs::types::{Capabilities, DEFAULT_ACCEPTED_CODES, UserInfo};
use crate::session::{ServerVersion, Session};
use crate::webdav::client::WebDavClient;

const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", utf8_percent_encode(k, FORM), utf8_percent_encode(v, FORM)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Client for the OCS REST endpoints (`ocs/v1.php/...`, `ocs/v2.php/...`).
///
/// Shares transport, credentials and connection pool with [`WebDavClient`].
/// Every reply is parsed (XML or JSON) and checked with
/// [`ensure_status`] before the payload is returned.
#[derive(Clone)]
pub struct OcsClient {
    transport: WebDavClient,
}

impl OcsClient {
    pub fn new(session: Session) -> Result<Self> {
        Ok(Self {
            transport: WebDavClient::new(session)?,
        })
    }

    /// OCS client on the same session and pool as `webdav`.
    pub fn from_webdav(webdav: &WebDavClient) -> Self {
        Self {
            transport: webdav.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        self.transport.session()
    }

    pub fn set_timeout(&mut self, per_request: Duration) {
        self.transport.set_timeout(per_request);
    }

    /// Call an OCS endpoint and return the checked envelope.
    ///
    /// `path` is relative to the instance root (e.g. `ocs/v1.php/cloud/user`).
    /// `params` go into the query string for `GET`/`DELETE` and into a
    /// form-encoded body otherwise. `accepted` lists the OCS status codes
    /// treated as success.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        accepted: &[i64],
    ) -> Result<Value> {
        let in_query = matches!(method, Method::GET | Method::DELETE);
        let mut query = vec![("format", "json")];
        if in_query {
            query.extend_from_slice(params);
        }
        let separator = if path.contains('?') { '&' } else { '?' };
        let target = format!("{path}{separator}{}", encode_form(&query));

        let mut h = HeaderMap::new();
        h.insert("OCS-APIREQUEST", header::HeaderValue::from_static("true"));
        h.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let body = if !in_query && !params.is_empty() {
            h.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            Some(Bytes::from(encode_form(params)))
        } else {
            None
        };

        let resp = self.transport.send(method, &target, h, body, None).await?;
        let envelope = match parse_body(resp.body()) {
            Ok(envelope) => envelope,
            Err(_) if !resp.status().is_success() => {
                return Err(ClientError::UnexpectedStatus {
                    status: resp.status(),
                    message: None,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        ensure_status(&envelope, accepted)?;
        Ok(envelope)
    }

    /// [`request`](Self::request) followed by decoding `ocs.data` into `T`.
    pub async fn request_data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        accepted: &[i64],
    ) -> Result<T> {
        let mut envelope = self.request(method, path, params, accepted).await?;
        let data = envelope
            .get_mut("ocs")
            .and_then(|ocs| ocs.get_mut("data"))
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_capabilities(&self) -> Result<Capabilities> {
        self.request_data(
            Method::GET,
            "ocs/v1.php/cloud/capabilities",
            &[],
            DEFAULT_ACCEPTED_CODES,
        )
        .await
    }

    pub async fn get_current_user(&self) -> Result<UserInfo> {
        self.request_data(Method::GET, "ocs/v1.php/cloud/user", &[], DEFAULT_ACCEPTED_CODES)
            .await
    }

    /// Server version as reported by the capabilities endpoint. Feed it to
    /// [`Session::with_version`] to pick the preferred DAV variant.
    pub async fn detect_version(&self) -> Result<ServerVersion> {
        Ok(self.get_capabilities().await?.version.to_version())
    }
}
