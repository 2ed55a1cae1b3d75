use webdav_session::webdav::proppatch::{
    is_read_only_property, reported_properties, writable_properties,
};
use webdav_session::webdav::{NS_DAV, READ_ONLY_PROPERTIES};
use webdav_session::{XmlElement, build_proppatch_body, synthesize_propertyupdate};

use crate::support::MULTISTATUS;

fn multistatus_with(props: &str) -> XmlElement {
    let doc = format!(
        r#"<D:multistatus xmlns:D="DAV:" xmlns:Z="urn:example:z"><D:response><D:href>/x</D:href><D:propstat><D:prop>{props}</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#
    );
    XmlElement::parse(doc.as_bytes()).unwrap()
}

fn all_read_only() -> String {
    READ_ONLY_PROPERTIES
        .iter()
        .map(|name| format!("<D:{name}/>"))
        .collect()
}

#[test]
fn test_read_only_list() {
    assert_eq!(READ_ONLY_PROPERTIES.len(), 9);
    assert!(READ_ONLY_PROPERTIES.contains(&"getetag"));
    assert!(READ_ONLY_PROPERTIES.contains(&"supportedlock"));
}

#[test]
fn test_read_only_requires_dav_namespace() {
    assert!(is_read_only_property(&XmlElement::dav("displayname")));
    assert!(!is_read_only_property(&XmlElement::new(
        Some("urn:example:z"),
        Some("Z"),
        "displayname"
    )));
    assert!(!is_read_only_property(&XmlElement::new(None, None, "getetag")));
}

#[test]
fn test_only_read_only_properties_gives_empty_update() {
    let update = synthesize_propertyupdate(&multistatus_with(&all_read_only()));

    assert!(update.is(NS_DAV, "propertyupdate"));
    assert!(update.child(NS_DAV, "set").is_none());
    assert_eq!(update.to_xml(), r#"<D:propertyupdate xmlns:D="DAV:"/>"#);
}

#[test]
fn test_mixed_properties_keep_source_order() {
    let doc = multistatus_with(
        "<Z:color>red</Z:color><D:getetag>\"1\"</D:getetag><Z:size>3</Z:size><D:displayname>x</D:displayname><Z:tag/>",
    );
    let update = synthesize_propertyupdate(&doc);

    let props = update.select(&[(NS_DAV, "set"), (NS_DAV, "prop")]);
    assert_eq!(props.len(), 1);
    let names: Vec<&str> = props[0].elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["color", "size", "tag"]);
    assert_eq!(props[0].elements().next().unwrap().text(), "red");
}

#[test]
fn test_custom_count_unaffected_by_read_only() {
    let custom: String = (0..5).map(|i| format!("<Z:p{i}>{i}</Z:p{i}>")).collect();
    let doc = multistatus_with(&format!("{}{custom}", all_read_only()));

    assert_eq!(reported_properties(&doc).len(), 14);
    assert_eq!(writable_properties(&doc).len(), 5);
}

#[test]
fn test_non_dav_displayname_is_copied() {
    let doc = multistatus_with("<Z:displayname>mine</Z:displayname>");
    assert_eq!(writable_properties(&doc).len(), 1);
}

#[test]
fn test_properties_collected_across_propstats() {
    let doc = XmlElement::parse(
        br#"<D:multistatus xmlns:D="DAV:" xmlns:Z="urn:example:z">
  <D:response>
    <D:href>/x</D:href>
    <D:propstat><D:prop><Z:a>1</Z:a></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
    <D:propstat><D:prop><Z:b/></D:prop><D:status>HTTP/1.1 404 Not Found</D:status></D:propstat>
  </D:response>
</D:multistatus>"#,
    )
    .unwrap();

    let names: Vec<&str> = writable_properties(&doc)
        .into_iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_non_multistatus_root_gives_empty_update() {
    let doc = XmlElement::parse(br#"<D:prop xmlns:D="DAV:"><D:foo/></D:prop>"#).unwrap();
    assert!(reported_properties(&doc).is_empty());
    assert!(synthesize_propertyupdate(&doc).children.is_empty());
}

#[test]
fn test_body_keeps_foreign_namespaces() {
    let body = build_proppatch_body(&XmlElement::parse(MULTISTATUS.as_bytes()).unwrap());
    let reparsed = XmlElement::parse(body.as_bytes()).unwrap();

    let author = reparsed.descendants("http://ns.example.com/props/", "author");
    assert_eq!(author.len(), 1);
    assert_eq!(author[0].text(), "Ada & Grace");
    assert!(reparsed.descendants(NS_DAV, "getetag").is_empty());
}
