pub mod client;
pub mod parse;
pub mod status;
pub mod types;

pub use client::OcsClient;
pub use parse::{coerce_booleans, parse_body, xml_to_value};
pub use status::{check_status, ensure_status, status_code};
pub use types::{
    Capabilities, DEFAULT_ACCEPTED_CODES, ErrorMessage, Ocs, OcsEnvelope, OcsMeta,
    ServerVersionInfo, UserInfo,
};
