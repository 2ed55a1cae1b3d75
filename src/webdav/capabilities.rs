use anyhow::Result;
use hyper::{HeaderMap, Method};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::common::http::DavTransport;
use crate::webdav::session::DavSession;

/// Collect comma-separated tokens from every instance of header `name`.
fn header_tokens(headers: &HeaderMap, name: &str, uppercase: bool) -> BTreeSet<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if uppercase {
                token.to_ascii_uppercase()
            } else {
                token.to_string()
            }
        })
        .collect()
}

impl<T: DavTransport> DavSession<T> {
    /// Learn the server's capabilities with an `OPTIONS` probe, at most once per session.
    ///
    /// Later calls return immediately. A refused probe counts as "no capabilities";
    /// a transport failure propagates and leaves the session unprobed.
    pub async fn probe_capabilities(&mut self) -> Result<()> {
        if self.probed {
            return Ok(());
        }

        let target = self.target.clone();
        let response = self
            .send(Method::OPTIONS, &target, HeaderMap::new(), None)
            .await?;
        self.probed = true;

        if !response.status().is_success() {
            warn!(target_url = %target, status = %response.status(), "OPTIONS refused");
            return Ok(());
        }

        self.allowed_methods = header_tokens(response.headers(), "Allow", true);
        self.compliance_classes = header_tokens(response.headers(), "DAV", false);
        debug!(
            target_url = %target,
            allow = ?self.allowed_methods,
            dav = ?self.compliance_classes,
            "capabilities probed"
        );
        Ok(())
    }

    /// Raw `OPTIONS` exchange on the target; does not touch the recorded capabilities.
    pub async fn options(&self) -> Result<hyper::Response<bytes::Bytes>> {
        let response = self
            .send(Method::OPTIONS, &self.target, HeaderMap::new(), None)
            .await?;
        Self::expect_success(&Method::OPTIONS, &self.target, response)
    }

    pub fn is_probed(&self) -> bool {
        self.probed
    }

    pub fn allowed_methods(&self) -> &BTreeSet<String> {
        &self.allowed_methods
    }

    pub fn compliance_classes(&self) -> &BTreeSet<String> {
        &self.compliance_classes
    }

    /// Both `LOCK` and `UNLOCK` were advertised in `Allow`. False until probed.
    pub fn supports_locking(&self) -> bool {
        self.allowed_methods.contains("LOCK") && self.allowed_methods.contains("UNLOCK")
    }

    /// `calendar-access` was advertised in `DAV`. False until probed.
    pub fn supports_caldav(&self) -> bool {
        self.compliance_classes.contains("calendar-access")
    }
}
