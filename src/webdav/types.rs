use anyhow::Result;
use bytes::Bytes;
use hyper::Uri;

/// WebDAV Depth
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// Username/password pair used for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Basic auth is only ever sent when both halves are non-empty.
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// When credentials are attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Attach Basic auth to every request whenever usable credentials are set.
    #[default]
    Preemptive,
    /// Send the request plain first; on `401 Unauthorized` retry exactly once
    /// with credentials and return that second response as-is.
    OnChallenge,
}

/// Body and media type of a resource fetched with `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Resolve `path` against `base`.
///
/// Absolute `http(s)://` references replace the base, `/`-prefixed paths replace
/// its path and anything else is appended below the base collection.
pub fn resolve_uri(base: &Uri, path: &str) -> Result<Uri> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.parse()?);
    }

    let mut parts = base.clone().into_parts();
    let existing_path = parts
        .path_and_query
        .as_ref()
        .map(|pq| pq.path())
        .unwrap_or("/");

    let (path_only, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    let mut combined = if path_only.is_empty() {
        existing_path.to_string()
    } else if path_only.starts_with('/') {
        path_only.to_string()
    } else {
        let mut joined = existing_path.trim_end_matches('/').to_string();
        joined.push('/');
        joined.push_str(path_only);
        joined
    };
    if combined.is_empty() {
        combined.push('/');
    }

    let path_and_query = match query {
        Some(q) => format!("{combined}?{q}").parse()?,
        None => combined.parse()?,
    };
    parts.path_and_query = Some(path_and_query);
    Ok(Uri::from_parts(parts)?)
}

/// The collection containing `uri`, i.e. `uri + "/.."` normalized.
///
/// Trailing slashes are collapsed first, the result always ends in `/`, any
/// query is dropped, and the root is its own parent.
pub fn parent_url(uri: &Uri) -> Result<Uri> {
    let trimmed = uri.path().trim_end_matches('/');
    let parent = match trimmed.rfind('/') {
        Some(idx) => &trimmed[..=idx],
        None => "/",
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(parent.parse()?);
    Ok(Uri::from_parts(parts)?)
}
