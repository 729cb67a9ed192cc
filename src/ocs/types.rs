use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::session::ServerVersion;

/// Status codes accepted when the caller does not pass its own set.
pub const DEFAULT_ACCEPTED_CODES: &[i64] = &[100];

/// Error payload of a failed OCS request.
///
/// Servers normally send a message; when the message is empty the whole
/// envelope is kept so callers can still inspect it.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorMessage {
    Message(String),
    Envelope(Value),
}

impl ErrorMessage {
    pub fn as_message(&self) -> Option<&str> {
        match self {
            ErrorMessage::Message(m) => Some(m),
            ErrorMessage::Envelope(_) => None,
        }
    }

    pub fn as_envelope(&self) -> Option<&Value> {
        match self {
            ErrorMessage::Message(_) => None,
            ErrorMessage::Envelope(v) => Some(v),
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Message(m) => f.write_str(m),
            ErrorMessage::Envelope(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

/// Accept numbers sent either as JSON numbers or as strings (XML bodies).
pub(crate) fn lenient_number<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64> + FromStr,
    <T as FromStr>::Err: fmt::Display,
{
    match NumberOrString::deserialize(d)? {
        NumberOrString::Number(n) => {
            T::try_from(n).map_err(|_| de::Error::custom(format!("number out of range: {n}")))
        }
        NumberOrString::String(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Typed view of an OCS envelope.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OcsEnvelope<T> {
    pub ocs: Ocs<T>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Ocs<T> {
    pub meta: OcsMeta,
    pub data: T,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OcsMeta {
    #[serde(default)]
    pub status: String,
    #[serde(deserialize_with = "lenient_number")]
    pub statuscode: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T: DeserializeOwned> OcsEnvelope<T> {
    pub fn from_value(envelope: Value) -> serde_json::Result<Self> {
        serde_json::from_value(envelope)
    }
}

/// `version` block of the capabilities endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVersionInfo {
    #[serde(deserialize_with = "lenient_number")]
    pub major: u32,
    #[serde(deserialize_with = "lenient_number")]
    pub minor: u32,
    #[serde(deserialize_with = "lenient_number")]
    pub micro: u32,
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub edition: String,
}

impl ServerVersionInfo {
    pub fn to_version(&self) -> ServerVersion {
        ServerVersion::new(self.major, self.minor, self.micro)
    }
}

/// Payload of `ocs/v1.php/cloud/capabilities`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Capabilities {
    pub version: ServerVersionInfo,
    #[serde(default)]
    pub capabilities: Value,
}

impl Capabilities {
    /// Look up a nested capability, e.g. `&["files_sharing", "api_enabled"]`.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.capabilities, |node, key| node.get(key))
    }
}

/// Payload of `ocs/v1.php/cloud/user`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    #[serde(rename = "display-name", alias = "displayname", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
