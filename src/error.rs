use hyper::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Protocol-level failures surfaced by a [`DavSession`](crate::DavSession).
///
/// Operations return `anyhow::Result`; these errors travel inside it and can be
/// recovered with `err.downcast_ref::<DavError>()`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DavError {
    /// The server answered with a status the operation does not handle.
    #[error("{method} {url} failed: {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
    },

    /// MKCOL kept failing even after the parent chain was created.
    #[error("failed creating {0}")]
    CollectionCreation(String),

    /// No response within the session's response timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The server does not advertise the `calendar-access` compliance class.
    #[error("server does not support CalDAV (calendar-access)")]
    CalDavUnsupported,

    /// A response body could not be parsed as XML.
    #[error("XML error: {0}")]
    Xml(String),
}

impl DavError {
    /// HTTP status carried by a [`DavError::Status`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The final answer was `401 Unauthorized`, after any auth retry.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
