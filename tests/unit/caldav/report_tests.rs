use webdav_session::webdav::NS_DAV;
use webdav_session::{CalendarObject, DavError, Depth, XmlElement, map_calendar_objects};

use crate::support::*;

const URL: &str = "http://cal.test/dav/user01/personal/";

const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/user01/personal/standup.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag> "e1" </d:getetag>
        <cal:calendar-data><![CDATA[BEGIN:VCALENDAR
VERSION:2.0
BEGIN:VEVENT
UID:standup
SUMMARY:Standup & coffee
END:VEVENT
END:VCALENDAR
]]></cal:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/user01/personal/review.ics</d:href>
    <d:propstat>
      <d:prop><cal:calendar-data/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:getetag>"e2"</d:getetag><cal:calendar-data>BEGIN:VCALENDAR&#13;
END:VCALENDAR&#13;
</cal:calendar-data></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/user01/personal/gone.ics</d:href>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:response>
  <d:response>
    <d:propstat><d:prop><d:getetag>"orphan"</d:getetag></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

fn caldav_server() -> ScriptedTransport {
    ScriptedTransport::new(|r| match r.method.as_str() {
        "OPTIONS" => respond(
            200,
            &[
                ("Allow", "OPTIONS, GET, PUT, DELETE, PROPFIND, REPORT, LOCK, UNLOCK"),
                ("DAV", "1, 2, 3, calendar-access"),
            ],
            "",
        ),
        "REPORT" => respond(207, &[("Content-Type", "application/xml")], REPORT),
        _ => status(400),
    })
}

#[tokio::test]
async fn test_caldav_report_request() {
    let transport = caldav_server();
    let mut s = session(URL, &transport);
    s.set_depth(Some(Depth::Zero));

    let doc = s.caldav_report().await.unwrap();

    assert!(doc.is(NS_DAV, "multistatus"));
    assert_eq!(
        transport.calls(),
        vec!["OPTIONS /dav/user01/personal/", "REPORT /dav/user01/personal/"]
    );

    let report = transport.first("REPORT");
    assert_eq!(report.header("depth"), Some("1"));
    assert!(report.header("content-type").unwrap().starts_with("application/xml"));
    assert_eq!(
        report.body_str(),
        concat!(
            r#"<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">"#,
            r#"<D:prop><D:getetag/><C:calendar-data/></D:prop>"#,
            r#"<C:filter><C:comp-filter name="VCALENDAR"/></C:filter>"#,
            r#"</C:calendar-query>"#,
        )
    );
}

#[tokio::test]
async fn test_caldav_report_probes_once() {
    let transport = caldav_server();
    let mut s = session(URL, &transport);

    s.caldav_report().await.unwrap();
    s.caldav_report().await.unwrap();

    assert_eq!(transport.count("OPTIONS"), 1);
    assert_eq!(transport.count("REPORT"), 2);
}

#[tokio::test]
async fn test_caldav_report_unsupported() {
    let transport = ScriptedTransport::new(|_| options_with_locking());
    let mut s = session(URL, &transport);

    let err = s.caldav_report().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DavError>(),
        Some(DavError::CalDavUnsupported)
    ));
    assert_eq!(transport.count("REPORT"), 0);
}

#[tokio::test]
async fn test_caldav_report_error_status() {
    let transport = ScriptedTransport::new(|r| match r.method.as_str() {
        "OPTIONS" => respond(200, &[("DAV", "1, calendar-access")], ""),
        _ => status(403),
    });
    let mut s = session(URL, &transport);

    let err = s.caldav_report().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<DavError>().unwrap().status(),
        Some(hyper::StatusCode::FORBIDDEN)
    );
}

#[test]
fn test_map_calendar_objects() {
    let doc = XmlElement::parse(REPORT.as_bytes()).unwrap();
    let objects = map_calendar_objects(&doc);

    assert_eq!(objects.len(), 3);

    assert_eq!(objects[0].href, "/dav/user01/personal/standup.ics");
    assert_eq!(objects[0].etag.as_deref(), Some("\"e1\""));
    let data = objects[0].calendar_data.as_deref().unwrap();
    assert!(data.starts_with("BEGIN:VCALENDAR\nVERSION:2.0\n"));
    assert!(data.contains("SUMMARY:Standup & coffee\n"));
    assert!(data.ends_with("END:VCALENDAR\n"));
    assert_eq!(objects[0].status.as_deref(), Some("HTTP/1.1 200 OK"));

    // The empty calendar-data in the 404 propstat loses to the populated one.
    assert_eq!(objects[1].etag.as_deref(), Some("\"e2\""));
    assert_eq!(
        objects[1].calendar_data.as_deref(),
        Some("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
    );
    assert_eq!(objects[1].status.as_deref(), Some("HTTP/1.1 404 Not Found"));

    assert_eq!(
        objects[2],
        CalendarObject {
            href: "/dav/user01/personal/gone.ics".into(),
            etag: None,
            calendar_data: None,
            status: Some("HTTP/1.1 404 Not Found".into()),
        }
    );
}

#[test]
fn test_map_calendar_objects_empty_report() {
    let doc = XmlElement::parse(br#"<D:multistatus xmlns:D="DAV:"/>"#).unwrap();
    assert!(map_calendar_objects(&doc).is_empty());
}
