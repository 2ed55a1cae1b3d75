//! Build a PROPPATCH body from the properties reported by a PROPFIND.
//!
//! Only `set` instructions are produced. Properties present on the destination
//! but absent from the source are left alone.

use crate::webdav::xml::{NS_DAV, XmlElement, XmlNode};

/// Server-computed (live) properties in `DAV:` that a client can never write.
pub const READ_ONLY_PROPERTIES: [&str; 9] = [
    "creationdate",
    "displayname",
    "getcontentlength",
    "getcontenttype",
    "getetag",
    "getlastmodified",
    "lockdiscovery",
    "resourcetype",
    "supportedlock",
];

pub fn is_read_only_property(prop: &XmlElement) -> bool {
    prop.namespace.as_deref() == Some(NS_DAV) && READ_ONLY_PROPERTIES.contains(&prop.name.as_str())
}

/// Every `/multistatus/response/propstat/prop/*` element, in document order.
pub fn reported_properties(multistatus: &XmlElement) -> Vec<&XmlElement> {
    if !multistatus.is(NS_DAV, "multistatus") {
        return Vec::new();
    }
    multistatus
        .select(&[
            (NS_DAV, "response"),
            (NS_DAV, "propstat"),
            (NS_DAV, "prop"),
        ])
        .into_iter()
        .flat_map(|prop| prop.elements())
        .collect()
}

/// The reported properties a PROPPATCH may set.
pub fn writable_properties(multistatus: &XmlElement) -> Vec<&XmlElement> {
    reported_properties(multistatus)
        .into_iter()
        .filter(|prop| !is_read_only_property(prop))
        .collect()
}

/// `<D:propertyupdate>` setting every writable property of `multistatus`.
///
/// With nothing to copy the update is empty (no `<D:set>` child).
pub fn synthesize_propertyupdate(multistatus: &XmlElement) -> XmlElement {
    let update = XmlElement::dav("propertyupdate");
    let props = writable_properties(multistatus);
    if props.is_empty() {
        return update;
    }

    let mut prop = XmlElement::dav("prop");
    prop.children = props
        .into_iter()
        .map(|p| XmlNode::Element(p.clone()))
        .collect();
    update.with_child(XmlElement::dav("set").with_child(prop))
}

pub fn build_proppatch_body(multistatus: &XmlElement) -> String {
    synthesize_propertyupdate(multistatus).to_xml()
}
