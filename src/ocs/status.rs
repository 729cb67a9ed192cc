//! Uniform success/error view over OCS envelopes.
//!
//! The functions take the generic envelope produced by
//! [`parse_body`](crate::ocs::parse_body), so XML and JSON replies go through
//! the same checks.

use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::ocs::types::ErrorMessage;

fn meta(envelope: &Value) -> Option<&Map<String, Value>> {
    envelope.get("ocs")?.get("meta")?.as_object()
}

fn parse_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Raw `ocs.meta.statuscode`, or `None` when the envelope has no `ocs.meta`
/// or the code does not parse as an integer.
pub fn status_code(envelope: &Value) -> Option<i64> {
    meta(envelope)?.get("statuscode").and_then(parse_code)
}

/// Check the envelope's status code against `accepted`.
///
/// Returns `None` when the code is accepted or when there is no `ocs.meta`
/// to check. Otherwise the error is `meta.message`, or the whole envelope
/// when the message is empty.
///
/// ```
/// use ocs_dav_rs::ocs::{DEFAULT_ACCEPTED_CODES, ErrorMessage, check_status};
/// use serde_json::json;
///
/// let ok = json!({"ocs": {"meta": {"statuscode": 100, "message": ""}}});
/// assert_eq!(check_status(&ok, DEFAULT_ACCEPTED_CODES), None);
///
/// let missing = json!({"ocs": {"meta": {"statuscode": 404, "message": "Wrong path"}}});
/// assert_eq!(
///     check_status(&missing, DEFAULT_ACCEPTED_CODES),
///     Some(ErrorMessage::Message("Wrong path".into())),
/// );
/// ```
pub fn check_status(envelope: &Value, accepted: &[i64]) -> Option<ErrorMessage> {
    let meta = meta(envelope)?;
    let code = meta.get("statuscode").and_then(parse_code);
    if code.is_some_and(|c| accepted.contains(&c)) {
        return None;
    }

    Some(match meta.get("message") {
        Some(Value::String(s)) if !s.is_empty() => ErrorMessage::Message(s.clone()),
        Some(other) if !is_empty_value(other) => ErrorMessage::Message(other.to_string()),
        _ => {
            log::warn!("OCS status {code:?} without message, returning full envelope");
            ErrorMessage::Envelope(envelope.clone())
        }
    })
}

/// [`check_status`] as a `Result`, for use with `?`.
pub fn ensure_status(envelope: &Value, accepted: &[i64]) -> Result<(), ClientError> {
    match check_status(envelope, accepted) {
        None => Ok(()),
        Some(message) => Err(ClientError::Ocs {
            status_code: status_code(envelope),
            message,
        }),
    }
}
