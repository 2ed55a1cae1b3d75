use anyhow::Result;
use bytes::Bytes;
use hyper::{HeaderMap, Method, header};

use crate::caldav::types::CalendarObject;
use crate::common::http::DavTransport;
use crate::error::DavError;
use crate::webdav::session::DavSession;
use crate::webdav::types::Depth;
use crate::webdav::xml::{CALENDAR_QUERY_BODY, NS_CALDAV, NS_DAV, XmlElement};

impl<T: DavTransport> DavSession<T> {
    /// CalDAV `calendar-query` REPORT (every `VCALENDAR`, with etags and data) on the target.
    ///
    /// Capabilities are probed first; a server that does not advertise
    /// `calendar-access` yields [`DavError::CalDavUnsupported`] without a REPORT
    /// being sent.
    pub async fn caldav_report(&mut self) -> Result<XmlElement> {
        self.probe_capabilities().await?;
        if !self.supports_caldav() {
            return Err(DavError::CalDavUnsupported.into());
        }

        let method = Method::from_bytes(b"REPORT")?;
        let mut h = HeaderMap::new();
        h.insert("Depth", header::HeaderValue::from_static(Depth::One.as_str()));
        h.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/xml; charset=utf-8"),
        );

        let response = self
            .send(
                method.clone(),
                &self.target,
                h,
                Some(Bytes::from_static(CALENDAR_QUERY_BODY.as_bytes())),
            )
            .await?;
        let response = Self::expect_success(&method, &self.target, response)?;
        XmlElement::parse(response.body())
    }
}

/// Map a calendar-query multistatus document to the calendar objects it reports.
///
/// Responses without an `href` are skipped. When a response carries several
/// propstats, the first non-empty value of each property wins.
pub fn map_calendar_objects(report: &XmlElement) -> Vec<CalendarObject> {
    report
        .children_named(NS_DAV, "response")
        .filter_map(|response| {
            let href = response.child(NS_DAV, "href")?.text().trim().to_string();
            if href.is_empty() {
                return None;
            }

            let props: Vec<&XmlElement> = response
                .select(&[(NS_DAV, "propstat"), (NS_DAV, "prop")])
                .into_iter()
                .flat_map(|prop| prop.elements())
                .collect();
            let find = |ns: &str, name: &str| {
                props
                    .iter()
                    .filter(|p| p.is(ns, name))
                    .map(|p| p.text())
                    .find(|text| !text.trim().is_empty())
            };

            let status = response
                .child(NS_DAV, "status")
                .or_else(|| {
                    response
                        .select(&[(NS_DAV, "propstat"), (NS_DAV, "status")])
                        .into_iter()
                        .next()
                })
                .map(|s| s.text().trim().to_string());

            Some(CalendarObject {
                href,
                etag: find(NS_DAV, "getetag").map(|e| e.trim().to_string()),
                calendar_data: find(NS_CALDAV, "calendar-data"),
                status,
            })
        })
        .collect()
}
