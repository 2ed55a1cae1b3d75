//! Multi-step operations composed from the verbs and the lock manager.

use anyhow::Result;

use crate::common::http::DavTransport;
use crate::webdav::session::DavSession;
use crate::webdav::types::Content;
use crate::webdav::xml::XmlElement;

impl<T: DavTransport> DavSession<T> {
    /// `GET` then `PROPFIND` on the target.
    pub async fn get_props_and_content(&self) -> Result<(XmlElement, Content)> {
        let content = self.get_content().await?;
        let props = self.propfind().await?;
        Ok((props, content))
    }

    /// `PUT` the content, then `PROPPATCH` the writable properties of `props`.
    pub async fn put_content_and_props(&self, content: &Content, props: &XmlElement) -> Result<()> {
        self.put_content(content.body.clone(), content.content_type.as_deref())
            .await?;
        self.proppatch(props).await
    }

    /// Copy this session's target, content and dead properties, to `dest`'s target.
    ///
    /// The source is locked (existing resources only) for the whole copy and
    /// unlocked afterwards whatever the destination answered. The destination
    /// takes its own lock if its server offers one; its requests only ever carry
    /// its own token.
    pub async fn copy_to<U: DavTransport>(&mut self, dest: &mut DavSession<U>) -> Result<()> {
        self.with_lock(true, async |src| {
            let (props, content) = src.get_props_and_content().await?;
            dest.with_lock(false, async |dst| {
                dst.put_content_and_props(&content, &props).await
            })
            .await
        })
        .await
    }

    /// `MOVE` to `destination` while holding a lock on the source.
    pub async fn locked_move(&mut self, destination: &str) -> Result<()> {
        self.with_lock(true, async |s| s.move_to(destination).await)
            .await
    }

    /// `DELETE` the target under a lock; UNLOCK is only needed if the delete fails.
    pub async fn locked_delete(&mut self) -> Result<()> {
        self.with_lock_for_delete(false, async |s| s.delete().await)
            .await
    }
}
