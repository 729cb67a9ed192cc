use hyper::StatusCode;
use thiserror::Error;

use crate::ocs::types::ErrorMessage;

/// Failure classes surfaced by the request façade.
///
/// Operations return `anyhow::Result`; use `err.downcast_ref::<ClientError>()`
/// to branch on a specific class.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The body was neither valid XML nor valid JSON. Carries the raw body.
    #[error("invalid response body: {body}")]
    InvalidResponseBody { body: String },

    /// The OCS envelope reported a status code outside the accepted set.
    #[error("OCS request failed ({}): {message}", status_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".into()))]
    Ocs {
        status_code: Option<i64>,
        message: ErrorMessage,
    },

    #[error("unexpected HTTP status {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    UnexpectedStatus {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("no such resource: {path}")]
    NotFound { path: String },

    #[error("session has no authorization header")]
    NotAuthenticated,

    #[error("the dav path variant requires a user id")]
    MissingUser,
}
