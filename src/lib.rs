//! Session-oriented WebDAV client for Rust, with the CalDAV calendar-query REPORT.
//!
//! A [`DavSession`] holds everything one conversation with a server needs: the
//! target resource, credentials, `Depth`, user agent, timeout, the capabilities
//! learned from `OPTIONS` and the lock token currently held. Operations are
//! methods on the session and run strictly one after another.
//!
//! # Features
//!
//! - One method per WebDAV verb: `PROPFIND`, `GET`, `PUT`, `DELETE`, `MOVE`,
//!   `MKCOL`, `PROPPATCH`, plus CalDAV `REPORT`
//! - Capability probing (`OPTIONS`) at most once per session
//! - Opportunistic locking: lock when the server supports it, carry on when it
//!   does not, and always unlock on the way out
//! - Recursive collection creation driven by `409 Conflict`
//! - Property copying that skips server-computed properties
//! - Pluggable transport; the default runs on hyper 1.x + rustls with
//!   transparent response decompression (br/zstd/gzip)
//!
//! # Examples
//!
//! ## Reading a resource
//!
//! ```no_run
//! use webdav_session::{DavSession, Depth};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut session = DavSession::new("https://dav.example.com/files/notes.txt")?;
//!     session.set_credentials("user01", "secret");
//!     session.set_depth(Some(Depth::Zero));
//!
//!     let content = session.get_content().await?;
//!     println!("{:?}: {} bytes", content.content_type, content.body.len());
//!
//!     let props = session.propfind().await?;
//!     println!("{}", props.to_xml());
//!
//!     session.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Copying between servers
//!
//! The source is locked (when its server supports it) for the whole copy and
//! unlocked afterwards, whatever happens on the destination.
//!
//! ```no_run
//! use webdav_session::DavSession;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut source = DavSession::new("https://a.example.com/dav/report.ods")?;
//!     source.set_credentials("alice", "secret");
//!
//!     let mut dest = DavSession::new("https://b.example.com/archive/2024/report.ods")?;
//!     dest.set_credentials("alice", "other-secret");
//!
//!     source.copy_to(&mut dest).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Creating nested collections
//!
//! ```no_run
//! use webdav_session::DavSession;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = DavSession::new("https://dav.example.com/projects/2024/q3/")?;
//!     // Creates /projects/, /projects/2024/ and /projects/2024/q3/ as needed.
//!     session.make_collection().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Calendar queries
//!
//! ```no_run
//! use webdav_session::{DavSession, DavError, map_calendar_objects};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = DavSession::new("https://cal.example.com/dav/user01/personal/")?;
//!
//!     let objects = session
//!         .run(async |s| {
//!             s.set_credentials("user01", "secret");
//!             let report = s.caldav_report().await?;
//!             Ok(map_calendar_objects(&report))
//!         })
//!         .await;
//!
//!     match objects {
//!         Ok(objects) => {
//!             for object in &objects {
//!                 println!("{} {:?}", object.href, object.etag);
//!             }
//!         }
//!         Err(err) if matches!(err.downcast_ref::<DavError>(), Some(DavError::CalDavUnsupported)) => {
//!             println!("not a CalDAV collection");
//!         }
//!         Err(err) => return Err(err),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Authentication
//!
//! By default ([`AuthPolicy::Preemptive`]) Basic credentials go on every request
//! once both username and password are non-empty. With
//! [`AuthPolicy::OnChallenge`] requests are sent anonymously first and retried
//! once with credentials after a `401`.
//!
//! # Errors
//!
//! Operations return [`anyhow::Result`]. Protocol failures (unexpected status,
//! timeout, failed collection creation, missing CalDAV support) are
//! [`DavError`] values and can be recovered with `downcast_ref`.
pub mod caldav;
pub mod common;
pub mod error;
pub mod webdav;

pub use caldav::{CalendarObject, map_calendar_objects};
pub use common::http::{DavTransport, HyperTransport};
pub use error::DavError;
pub use webdav::{
    AuthPolicy, Content, Credentials, DavSession, Depth, LockState, XmlElement, XmlNode,
    build_proppatch_body, synthesize_propertyupdate,
};
