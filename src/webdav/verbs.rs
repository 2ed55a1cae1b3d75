use anyhow::Result;
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, Uri, header};
use tracing::{debug, info};

use crate::common::http::DavTransport;
use crate::error::DavError;
use crate::webdav::lock::LockState;
use crate::webdav::proppatch::build_proppatch_body;
use crate::webdav::session::DavSession;
use crate::webdav::types::{Content, parent_url};
use crate::webdav::xml::{PROPFIND_ALLPROP_BODY, XmlElement};

fn xml_content_type() -> header::HeaderValue {
    header::HeaderValue::from_static("application/xml; charset=utf-8")
}

impl<T: DavTransport> DavSession<T> {
    /// `PROPFIND` `<allprop/>` on the target, returning the parsed multistatus document.
    ///
    /// The session `Depth`, when set, goes on the request.
    pub async fn propfind(&self) -> Result<XmlElement> {
        let method = Method::from_bytes(b"PROPFIND")?;
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, xml_content_type());

        let response = self
            .send(
                method.clone(),
                &self.target,
                h,
                Some(Bytes::from_static(PROPFIND_ALLPROP_BODY.as_bytes())),
            )
            .await?;
        let response = Self::expect_success(&method, &self.target, response)?;
        XmlElement::parse(response.body())
    }

    /// `GET` the target's content and media type.
    pub async fn get_content(&self) -> Result<Content> {
        let response = self
            .send(Method::GET, &self.target, HeaderMap::new(), None)
            .await?;
        let response = Self::expect_success(&Method::GET, &self.target, response)?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Ok(Content {
            content_type,
            body: response.into_body(),
        })
    }

    /// `PUT` new content at the target, naming the held lock in `If` when there is one.
    pub async fn put_content(&self, body: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut h = HeaderMap::new();
        if let Some(value) = self.if_header()? {
            h.insert("If", value);
        }
        if let Some(ct) = content_type {
            h.insert(header::CONTENT_TYPE, header::HeaderValue::from_str(ct)?);
        }

        let response = self.send(Method::PUT, &self.target, h, Some(body)).await?;
        Self::expect_success(&Method::PUT, &self.target, response)?;
        Ok(())
    }

    /// `DELETE` the target. Success also destroys any lock held on it.
    pub async fn delete(&mut self) -> Result<()> {
        let response = self
            .send(Method::DELETE, &self.target, HeaderMap::new(), None)
            .await?;
        Self::expect_success(&Method::DELETE, &self.target, response)?;

        if self.lock_token.take().is_some() {
            debug!(target_url = %self.target, "lock dropped with deleted resource");
        }
        self.lock_state = LockState::Unlocked;
        Ok(())
    }

    /// `MOVE` the target to `destination`, an absolute URL or server-absolute path.
    ///
    /// The session keeps pointing at the old location.
    pub async fn move_to(&self, destination: &str) -> Result<()> {
        let destination = self.build_uri(destination)?;
        let mut h = HeaderMap::new();
        h.insert(
            "Destination",
            header::HeaderValue::from_str(&destination.to_string())?,
        );

        let method = Method::from_bytes(b"MOVE")?;
        let response = self.send(method.clone(), &self.target, h, None).await?;
        Self::expect_success(&method, &self.target, response)?;
        Ok(())
    }

    /// `PROPPATCH` the target with the writable properties of a PROPFIND document.
    ///
    /// See [`synthesize_propertyupdate`](crate::webdav::proppatch::synthesize_propertyupdate)
    /// for what gets copied.
    pub async fn proppatch(&self, props: &XmlElement) -> Result<()> {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, xml_content_type());
        if let Some(value) = self.if_header()? {
            h.insert("If", value);
        }

        let method = Method::from_bytes(b"PROPPATCH")?;
        let body = Bytes::from(build_proppatch_body(props));
        let response = self
            .send(method.clone(), &self.target, h, Some(body))
            .await?;
        Self::expect_success(&method, &self.target, response)?;
        Ok(())
    }

    /// `MKCOL` on the target.
    ///
    /// Returns `false` on `409 Conflict`, which means an ancestor collection is
    /// missing; any other failure is an error.
    pub async fn mkcol(&self) -> Result<bool> {
        self.mkcol_at(&self.target).await
    }

    async fn mkcol_at(&self, uri: &Uri) -> Result<bool> {
        let method = Method::from_bytes(b"MKCOL")?;
        let response = self
            .send(method.clone(), uri, HeaderMap::new(), None)
            .await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(%uri, "MKCOL conflict, parent missing");
            return Ok(false);
        }
        Self::expect_success(&method, uri, response)?;
        Ok(true)
    }

    /// Create the target collection along with any missing ancestors.
    ///
    /// A conflict is taken to mean "parent missing": the parent chain is created
    /// first and MKCOL retried. Other causes of 409 (permissions, a plain file in
    /// the way) end up as [`DavError::CollectionCreation`]. Reaching the root
    /// without success fails rather than looping.
    pub async fn make_collection(&self) -> Result<()> {
        let mut pending: Vec<Uri> = Vec::new();
        let mut current = self.target.clone();

        loop {
            if self.mkcol_at(&current).await? {
                break;
            }
            let parent = parent_url(&current)?;
            if parent == current {
                return Err(DavError::CollectionCreation(current.to_string()).into());
            }
            pending.push(current);
            current = parent;
        }

        while let Some(uri) = pending.pop() {
            if !self.mkcol_at(&uri).await? {
                return Err(DavError::CollectionCreation(uri.to_string()).into());
            }
            info!(%uri, "created collection after creating its parent");
        }
        Ok(())
    }
}
