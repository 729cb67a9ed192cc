//! Async client for ownCloud/Nextcloud style servers.
//!
//! The crate talks to the WebDAV file API and to the OCS REST API over
//! hyper 1.x + rustls, and turns their replies into typed values:
//!
//! - WebDAV `207 Multi-Status` bodies become ordered [`FileInfo`] lists.
//!   Hrefs are mapped back to logical paths (`/docs/a.txt`), whatever DAV
//!   endpoint the session uses (`remote.php/webdav` or
//!   `remote.php/dav/files/{user}`).
//! - OCS envelopes, XML or JSON, go through one status check that yields
//!   either the payload or a [`ClientError::Ocs`].
//!
//! The decoding layer ([`webdav::resolve_path`], [`webdav::decode_entry`],
//! [`webdav::decode_all`], [`ocs::check_status`]) is made of pure functions
//! and can be used without a client.
//!
//! # Listing a folder
//!
//! ```no_run
//! use ocs_dav_rs::{Depth, OcsClient, Session, WebDavClient};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::new("https://cloud.example.com/")?
//!         .with_basic_auth("alice", "app-password")?;
//!
//!     // Pick the DAV endpoint from the server version.
//!     let version = OcsClient::new(session.clone())?.detect_version().await?;
//!     let files = WebDavClient::new(session.with_version(version))?;
//!
//!     for entry in files.list("/Documents", Depth::One, &[]).await? {
//!         println!("{} {:?} {:?}", entry.name(), entry.file_type(), entry.size());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Decoding a body you already have
//!
//! ```
//! use ocs_dav_rs::webdav::{decode_all, parse_multistatus_bytes};
//!
//! let body = br#"<d:multistatus xmlns:d="DAV:">
//!   <d:response>
//!     <d:href>/remote.php/webdav/docs/</d:href>
//!     <d:propstat>
//!       <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
//!       <d:status>HTTP/1.1 200 OK</d:status>
//!     </d:propstat>
//!   </d:response>
//! </d:multistatus>"#;
//!
//! let files = decode_all(parse_multistatus_bytes(body).unwrap(), 0);
//! assert_eq!(files[0].name(), "/docs");
//! assert!(files[0].is_dir());
//! ```
//!
//! # Handling OCS errors
//!
//! ```no_run
//! use ocs_dav_rs::{ClientError, OcsClient, Session};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let ocs = OcsClient::new(Session::new("https://cloud.example.com/")?.with_basic_auth("a", "b")?)?;
//! match ocs.get_current_user().await {
//!     Ok(user) => println!("logged in as {}", user.id),
//!     Err(err) => match err.downcast_ref::<ClientError>() {
//!         Some(ClientError::Ocs { status_code, message }) => {
//!             eprintln!("server refused ({status_code:?}): {message}")
//!         }
//!         _ => return Err(err),
//!     },
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod error;
pub mod ocs;
pub mod session;
pub mod webdav;

pub use common::compression::ContentEncoding;
pub use error::ClientError;
pub use ocs::{Capabilities, ErrorMessage, OcsClient, UserInfo};
pub use session::{DavPathVariant, ServerVersion, Session};
pub use webdav::{
    BatchItem, DavResponse, Depth, FileInfo, FileType, FilterRules, PropStat, PropValue,
    WebDavClient, XmlNode,
};
