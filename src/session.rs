//! Connection context shared by the WebDAV and OCS clients.
//!
//! A [`Session`] is a plain value: build it once, hand it to a client, and
//! build another one for a second account. Nothing in the crate keeps
//! process-wide connection state.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use hyper::{Uri, header};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;
use crate::webdav::path::encode_uri_path;

/// URL prefix convention used to address the file tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavPathVariant {
    /// Legacy `remote.php/webdav/...`.
    WebDav,
    /// `remote.php/dav/files/{user}/...`.
    Dav,
}

impl DavPathVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            DavPathVariant::WebDav => "webdav",
            DavPathVariant::Dav => "dav",
        }
    }

    /// Number of fixed segments after `remote.php/{variant}` that precede the
    /// logical path (`files/{user}` for [`DavPathVariant::Dav`]).
    pub fn left_trim_components(self) -> usize {
        match self {
            DavPathVariant::WebDav => 0,
            DavPathVariant::Dav => 2,
        }
    }

    /// Variant to use when none was chosen explicitly.
    ///
    /// Servers from major version 10 on expose the `dav` endpoint; older or
    /// unknown servers get the legacy one.
    pub fn preferred_for(version: Option<&ServerVersion>) -> Self {
        match version {
            Some(v) if v.major >= 10 => DavPathVariant::Dav,
            _ => DavPathVariant::WebDav,
        }
    }
}

/// Server version as `major.minor.patch`. Extra components are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ServerVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> Result<u32> {
            match parts.next() {
                None | Some("") => Ok(0),
                Some(p) => p
                    .parse::<u32>()
                    .map_err(|e| anyhow!("invalid {name} component in version {s:?}: {e}")),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Instance URL, credentials and path conventions for one account.
#[derive(Debug, Clone)]
pub struct Session {
    base_url: Uri,
    auth_header: Option<header::HeaderValue>,
    user_id: Option<String>,
    dav_variant: Option<DavPathVariant>,
    version: Option<ServerVersion>,
}

impl Session {
    /// Create a session for the instance rooted at `base_url`.
    ///
    /// A trailing `/` is added when missing so relative paths resolve below
    /// the instance root.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut url = base_url.trim().to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        let base_url: Uri = url.parse()?;
        if base_url.scheme().is_none() || base_url.authority().is_none() {
            return Err(anyhow!("base URL must be absolute: {base_url}"));
        }

        Ok(Self {
            base_url,
            auth_header: None,
            user_id: None,
            dav_variant: None,
            version: None,
        })
    }

    /// Use HTTP Basic credentials. The user name also becomes the user id.
    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Result<Self> {
        let token = format!("{}:{}", user, password);
        let val = format!("Basic {}", B64.encode(token));
        self.auth_header = Some(header::HeaderValue::from_str(&val)?);
        self.user_id = Some(user.to_string());
        Ok(self)
    }

    /// Use a bearer token. Pair with [`Session::with_user`] for the `dav` variant.
    pub fn with_bearer_token(mut self, token: &str) -> Result<Self> {
        let val = format!("Bearer {token}");
        self.auth_header = Some(header::HeaderValue::from_str(&val)?);
        Ok(self)
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_dav_variant(mut self, variant: DavPathVariant) -> Self {
        self.dav_variant = Some(variant);
        self
    }

    pub fn with_version(mut self, version: ServerVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn base_url(&self) -> &Uri {
        &self.base_url
    }

    pub fn auth_header(&self) -> Option<&header::HeaderValue> {
        self.auth_header.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn version(&self) -> Option<&ServerVersion> {
        self.version.as_ref()
    }

    /// The explicit variant, or the one preferred for the known server version.
    pub fn dav_variant(&self) -> DavPathVariant {
        self.dav_variant
            .unwrap_or_else(|| DavPathVariant::preferred_for(self.version.as_ref()))
    }

    pub fn left_trim_components(&self) -> usize {
        self.dav_variant().left_trim_components()
    }

    /// Instance-relative root of the file tree, without leading or trailing `/`.
    pub fn dav_root(&self) -> Result<String, ClientError> {
        match self.dav_variant() {
            DavPathVariant::WebDav => Ok("remote.php/webdav".to_string()),
            DavPathVariant::Dav => {
                let user = self.user_id.as_deref().ok_or(ClientError::MissingUser)?;
                Ok(format!("remote.php/dav/files{}", encode_uri_path(user)))
            }
        }
    }
}
