use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri, header};
use std::collections::BTreeSet;
use tokio::time::Duration;
use tracing::debug;

use crate::common::http::{DavTransport, HyperTransport};
use crate::error::DavError;
use crate::webdav::lock::LockState;
use crate::webdav::types::{AuthPolicy, Credentials, Depth, resolve_uri};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_USER_AGENT: &str = concat!("webdav-session/", env!("CARGO_PKG_VERSION"));

/// One WebDAV session: the per-connection context every operation reads and mutates.
///
/// A session is strictly sequential. Every operation awaits its exchange before
/// the next one starts, and mutating operations take `&mut self`. Sessions that
/// need to run concurrently each get their own instance (and transport).
///
/// # Example
/// ```no_run
/// use webdav_session::DavSession;
/// use anyhow::Result;
///
/// # async fn example() -> Result<()> {
/// let mut session = DavSession::new("https://dav.example.com/files/report.txt")?;
/// session.set_credentials("user01", "secret");
///
/// let listing = session
///     .run(async |s| {
///         let content = s.get_content().await?;
///         println!("{} bytes", content.body.len());
///         s.propfind().await
///     })
///     .await?;
/// println!("{} responses", listing.select(&[("DAV:", "response")]).len());
/// # Ok(())
/// # }
/// ```
pub struct DavSession<T = HyperTransport> {
    pub(crate) target: Uri,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) depth: Option<Depth>,
    pub(crate) user_agent: String,
    pub(crate) response_timeout: Option<Duration>,
    pub(crate) auth_policy: AuthPolicy,
    pub(crate) allowed_methods: BTreeSet<String>,
    pub(crate) compliance_classes: BTreeSet<String>,
    pub(crate) probed: bool,
    pub(crate) lock_token: Option<String>,
    pub(crate) lock_state: LockState,
    transport: T,
}

impl DavSession<HyperTransport> {
    /// Open a session on `url` over the default hyper + rustls transport.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_transport(url, HyperTransport::new()?)
    }
}

impl<T: DavTransport> DavSession<T> {
    /// Open a session on `url` bound to an existing transport.
    pub fn with_transport(url: &str, transport: T) -> Result<Self> {
        let target: Uri = url.parse()?;
        Ok(Self {
            target,
            credentials: None,
            depth: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            response_timeout: None,
            auth_policy: AuthPolicy::default(),
            allowed_methods: BTreeSet::new(),
            compliance_classes: BTreeSet::new(),
            probed: false,
            lock_token: None,
            lock_state: LockState::Unlocked,
            transport,
        })
    }

    // ----------- Setters -----------

    pub fn set_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.credentials = Some(Credentials::new(username, password));
    }

    pub fn set_depth(&mut self, depth: Option<Depth>) {
        self.depth = depth;
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    /// Override the per-exchange response timeout; `None` restores [`DEFAULT_TIMEOUT`].
    pub fn set_response_timeout(&mut self, timeout: Option<Duration>) {
        self.response_timeout = timeout;
    }

    pub fn set_auth_policy(&mut self, policy: AuthPolicy) {
        self.auth_policy = policy;
    }

    /// Re-point the session. Relative references resolve against the current target.
    pub fn set_target(&mut self, url: &str) -> Result<()> {
        self.target = resolve_uri(&self.target, url)?;
        Ok(())
    }

    // ----------- Accessors -----------

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn depth(&self) -> Option<Depth> {
        self.depth
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        self.auth_policy
    }

    pub fn lock_token(&self) -> Option<&str> {
        self.lock_token.as_deref()
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve `path` against the session target without changing it.
    pub fn build_uri(&self, path: &str) -> Result<Uri> {
        resolve_uri(&self.target, path)
    }

    // ----------- Request builder -----------

    fn usable_credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref().filter(|c| c.is_usable())
    }

    fn basic_auth_value(credentials: &Credentials) -> Result<header::HeaderValue> {
        let token = format!("{}:{}", credentials.username, credentials.password);
        Ok(header::HeaderValue::from_str(&format!(
            "Basic {}",
            B64.encode(token)
        ))?)
    }

    /// Compose an outgoing request.
    ///
    /// `User-Agent` always comes from the session. The session `Depth` applies to
    /// PROPFIND and LOCK unless the caller already supplied one. Basic auth is
    /// attached only when `with_auth` is set and both credential halves are
    /// non-empty.
    pub fn build_request(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
        with_auth: bool,
    ) -> Result<Request<Bytes>> {
        let mut merged = headers.clone();
        merged.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&self.user_agent)?,
        );

        let depth_sensitive = method.as_str() == "PROPFIND" || method.as_str() == "LOCK";
        if depth_sensitive
            && !merged.contains_key("Depth")
            && let Some(depth) = self.depth
        {
            merged.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
        }

        if with_auth && let Some(credentials) = self.usable_credentials() {
            merged.insert(header::AUTHORIZATION, Self::basic_auth_value(credentials)?);
        }

        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri.clone())
            .body(body)?;
        *request.headers_mut() = merged;
        Ok(request)
    }

    // ----------- Transport invoker -----------

    /// Send one request through the transport, applying the session's auth policy.
    ///
    /// Under [`AuthPolicy::OnChallenge`] a `401` triggers a single retry with
    /// credentials; whatever comes back the second time is returned as-is.
    /// Transport failures are never retried.
    pub async fn send(
        &self,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Response<Bytes>> {
        let body = body.unwrap_or_default();
        let has_credentials = self.usable_credentials().is_some();
        let mut with_auth = has_credentials && self.auth_policy == AuthPolicy::Preemptive;
        let mut attempt = 0;

        loop {
            let request = self.build_request(&method, uri, &headers, body.clone(), with_auth)?;
            debug!(%method, %uri, authenticated = with_auth, "sending request");

            let response = self
                .transport
                .execute(request, self.response_timeout())
                .await?;
            debug!(%method, %uri, status = %response.status(), "received response");

            if response.status() == StatusCode::UNAUTHORIZED
                && !with_auth
                && has_credentials
                && attempt == 0
            {
                attempt += 1;
                with_auth = true;
                continue;
            }

            break Ok(response);
        }
    }

    /// Turn any non-2xx response into [`DavError::Status`].
    pub(crate) fn expect_success(
        method: &Method,
        uri: &Uri,
        response: Response<Bytes>,
    ) -> Result<Response<Bytes>> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(DavError::Status {
                method: method.clone(),
                url: uri.to_string(),
                status: response.status(),
            }
            .into())
        }
    }

    // ----------- Driver -----------

    /// Run a sequence of operations, then close the session whatever the outcome.
    pub async fn run<R, F>(mut self, op: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        let result = op(&mut self).await;
        self.close();
        result
    }

    /// Tear the session down, releasing its transport.
    ///
    /// A lock still held at this point is left to expire server-side.
    pub fn close(self) {
        debug!(
            target_url = %self.target,
            lock_held = self.lock_token.is_some(),
            "closing session"
        );
        drop(self.transport);
    }
}
