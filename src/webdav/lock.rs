//! Conditional server-side locking.
//!
//! Locks are opportunistic: when the server does not advertise `LOCK`/`UNLOCK`, or
//! refuses the lock, the wrapped operation still runs, just without a token.

use anyhow::Result;
use bytes::Bytes;
use hyper::{HeaderMap, Method, Response, header};
use tracing::{debug, info, warn};

use crate::common::http::DavTransport;
use crate::webdav::session::DavSession;
use crate::webdav::xml::build_lockinfo_body;

/// Where the session is in the lock lifecycle.
///
/// `Failed` means the last LOCK was refused; it behaves exactly like `Unlocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locking,
    Locked,
    Unlocking,
    Failed,
}

/// Lock tokens go on the wire as `<token>`; some servers omit the brackets.
fn normalize_lock_token(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('<') && raw.ends_with('>') {
        raw.to_string()
    } else {
        format!("<{raw}>")
    }
}

impl<T: DavTransport> DavSession<T> {
    /// `If` header value naming the held lock, if any.
    pub(crate) fn if_header(&self) -> Result<Option<header::HeaderValue>> {
        match &self.lock_token {
            Some(token) => Ok(Some(header::HeaderValue::from_str(&format!("({token})"))?)),
            None => Ok(None),
        }
    }

    /// Try to take an exclusive write lock on the target.
    ///
    /// A refused lock is not an error: the session simply carries on unlocked.
    /// Only transport failures propagate. While a token is already held this
    /// does nothing; the existing lock stays in force.
    pub async fn acquire_lock(&mut self, require_existing: bool) -> Result<()> {
        if self.lock_token.is_some() {
            debug!(target_url = %self.target, "lock already held");
            return Ok(());
        }
        self.lock_state = LockState::Locking;

        let mut h = HeaderMap::new();
        h.insert("Timeout", header::HeaderValue::from_static("Second-300"));
        h.insert("Depth", header::HeaderValue::from_static("0"));
        h.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        if require_existing {
            h.insert(header::IF_MATCH, header::HeaderValue::from_static("*"));
        }
        let body = Bytes::from(build_lockinfo_body(&self.user_agent));

        let method = Method::from_bytes(b"LOCK")?;
        let target = self.target.clone();
        let response = match self.send(method, &target, h, Some(body)).await {
            Ok(response) => response,
            Err(err) => {
                self.lock_state = LockState::Failed;
                return Err(err);
            }
        };

        let token = response
            .headers()
            .get("Lock-Token")
            .and_then(|v| v.to_str().ok())
            .map(normalize_lock_token);

        match token {
            Some(token) if response.status().is_success() => {
                info!(target_url = %target, %token, "lock acquired");
                self.lock_token = Some(token);
                self.lock_state = LockState::Locked;
            }
            _ => {
                warn!(
                    target_url = %target,
                    status = %response.status(),
                    "lock refused, continuing without it"
                );
                self.lock_token = None;
                self.lock_state = LockState::Failed;
            }
        }
        Ok(())
    }

    /// Release the held lock, if any. The token is cleared whatever the server says.
    pub async fn release_lock(&mut self) {
        let Some(token) = self.lock_token.take() else {
            return;
        };
        self.lock_state = LockState::Unlocking;

        match self.send_unlock(&token).await {
            Ok(response) if response.status().is_success() => {
                debug!(target_url = %self.target, "lock released");
            }
            Ok(response) => {
                warn!(target_url = %self.target, status = %response.status(), "unlock refused");
            }
            Err(err) => {
                warn!(target_url = %self.target, error = %err, "unlock failed");
            }
        }
        self.lock_state = LockState::Unlocked;
    }

    async fn send_unlock(&self, token: &str) -> Result<Response<Bytes>> {
        let mut h = HeaderMap::new();
        h.insert("Lock-Token", header::HeaderValue::from_str(token)?);
        self.send(Method::from_bytes(b"UNLOCK")?, &self.target, h, None)
            .await
    }

    /// Run `op` under a lock on the target when the server supports locking.
    ///
    /// The lock is always released afterwards, whether `op` succeeded or not,
    /// and `op`'s own result is what the caller sees. Nested inside another
    /// bracket, `op` runs under the outer lock and the outer bracket releases it.
    pub async fn with_lock<R, F>(&mut self, require_existing: bool, op: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        if self.lock_token.is_some() {
            return op(&mut *self).await;
        }
        self.probe_capabilities().await?;
        if !self.supports_locking() {
            return op(&mut *self).await;
        }

        self.acquire_lock(require_existing).await?;
        let result = op(&mut *self).await;
        self.release_lock().await;
        result
    }

    /// Like [`with_lock`](Self::with_lock), for operations that delete the target.
    ///
    /// A successful DELETE destroys the lock server-side, so UNLOCK is only sent
    /// when `op` fails; on success the token is just forgotten.
    pub async fn with_lock_for_delete<R, F>(&mut self, require_existing: bool, op: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        if self.lock_token.is_some() {
            return op(&mut *self).await;
        }
        self.probe_capabilities().await?;
        if !self.supports_locking() {
            return op(&mut *self).await;
        }

        self.acquire_lock(require_existing).await?;
        let result = op(&mut *self).await;
        if result.is_ok() {
            self.lock_token = None;
            self.lock_state = LockState::Unlocked;
        } else {
            self.release_lock().await;
        }
        result
    }
}
