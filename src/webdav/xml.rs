//! Minimal namespaced XML tree used for PROPFIND/REPORT responses and PROPPATCH bodies.
//!
//! Parsing runs on `quick-xml`; namespace prefixes are resolved while reading so
//! every element knows its namespace URI. Rendering regenerates `xmlns`
//! declarations, which lets a subtree be lifted out of one document and dropped
//! into another without losing its bindings.

use anyhow::Result;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::DavError;

pub const NS_DAV: &str = "DAV:";
pub const NS_CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

pub const PROPFIND_ALLPROP_BODY: &str = r#"<D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;

pub const CALENDAR_QUERY_BODY: &str = concat!(
    r#"<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">"#,
    r#"<D:prop><D:getetag/><C:calendar-data/></D:prop>"#,
    r#"<C:filter><C:comp-filter name="VCALENDAR"/></C:filter>"#,
    r#"</C:calendar-query>"#,
);

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Exclusive write `LOCK` request naming `owner`.
pub fn build_lockinfo_body(owner: &str) -> String {
    let mut body = String::from(
        r#"<D:lockinfo xmlns:D="DAV:"><D:lockscope><D:exclusive/></D:lockscope><D:locktype><D:write/></D:locktype>"#,
    );
    body.push_str("<D:owner>");
    body.push_str(&escape_xml(owner));
    body.push_str("</D:owner></D:lockinfo>");
    body
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    /// Regular attributes; `xmlns` declarations are folded into `namespace`.
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

type Scope = Vec<(Option<String>, String)>;

fn lookup<'a>(scope: &'a Scope, prefix: Option<&str>) -> Option<&'a str> {
    scope
        .iter()
        .rev()
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, ns)| ns.as_str())
}

/// Only UTF-8 documents are accepted; anything else is rejected rather than
/// decoded lossily.
fn utf8(raw: &[u8]) -> Result<&str, DavError> {
    std::str::from_utf8(raw)
        .map_err(|err| DavError::Xml(format!("invalid UTF-8 in document: {err}")))
}

fn split_qname(raw: &[u8]) -> Result<(Option<String>, String), DavError> {
    let raw = utf8(raw)?;
    Ok(match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    })
}

fn decode_text(raw: &[u8]) -> Result<String, DavError> {
    unescape(utf8(raw)?)
        .map(|text| text.into_owned())
        .map_err(|err| DavError::Xml(format!("invalid character data: {err}")))
}

impl XmlElement {
    pub fn new(namespace: Option<&str>, prefix: Option<&str>, name: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element in the `DAV:` namespace with the conventional `D` prefix.
    pub fn dav(name: &str) -> Self {
        Self::new(Some(NS_DAV), Some("D"), name)
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(XmlNode::Text(text.to_string()));
        self
    }

    /// Qualified name match on namespace URI and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Element children in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &str,
        name: &str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.is(namespace, name))
    }

    pub fn child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children_named(namespace, name).next()
    }

    /// All descendants (not self) with the given qualified name, depth first.
    pub fn descendants(&self, namespace: &str, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        let mut pending: Vec<&XmlElement> = self.elements().collect();
        pending.reverse();
        while let Some(el) = pending.pop() {
            if el.is(namespace, name) {
                found.push(el);
            }
            let before = pending.len();
            pending.extend(el.elements());
            pending[before..].reverse();
        }
        found
    }

    /// Walk `path` (one qualified name per level) from this element's children.
    ///
    /// `select(&[(NS_DAV, "response"), (NS_DAV, "href")])` on a multistatus root
    /// yields every `href` directly below every `response`.
    pub fn select(&self, path: &[(&str, &str)]) -> Vec<&XmlElement> {
        let mut current = vec![self];
        for (namespace, name) in path {
            current = current
                .into_iter()
                .flat_map(|el| el.children_named(namespace, name))
                .collect();
        }
        current
    }

    /// Concatenated text content of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Parse a complete document and return its root element.
    pub fn parse(bytes: &[u8]) -> Result<XmlElement> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::with_capacity(8 * 1024);
        let mut scope: Scope = Vec::new();
        let mut open: Vec<(XmlElement, usize)> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let mark = scope.len();
                    let element = Self::open_element(&e, &mut scope)?;
                    open.push((element, mark));
                }
                Ok(Event::Empty(e)) => {
                    let mark = scope.len();
                    let element = Self::open_element(&e, &mut scope)?;
                    scope.truncate(mark);
                    Self::attach(&mut open, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let (element, mark) = open
                        .pop()
                        .ok_or_else(|| DavError::Xml("unbalanced end tag".into()))?;
                    scope.truncate(mark);
                    Self::attach(&mut open, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = decode_text(e.as_ref())?;
                    Self::push_text(&mut open, text);
                }
                Ok(Event::CData(e)) => {
                    let text = utf8(e.as_ref())?.to_string();
                    Self::push_text(&mut open, text);
                }
                Ok(Event::GeneralRef(e)) => {
                    let text = decode_text(format!("&{};", utf8(&e)?).as_bytes())?;
                    Self::push_text(&mut open, text);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(DavError::Xml(e.to_string()).into()),
                _ => {}
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err(DavError::Xml("unexpected end of document".into()).into());
        }
        root.ok_or_else(|| DavError::Xml("document has no root element".into()).into())
    }

    fn open_element(event: &BytesStart<'_>, scope: &mut Scope) -> Result<XmlElement> {
        let mut raw_attributes = Vec::new();
        for attr in event.attributes().with_checks(false) {
            let attr = attr.map_err(|e| DavError::Xml(format!("invalid attribute: {e}")))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| DavError::Xml(format!("invalid attribute value: {e}")))?
                .into_owned();
            if key == "xmlns" {
                scope.push((None, value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.push((Some(prefix.to_string()), value));
            } else {
                raw_attributes.push((key, value));
            }
        }

        let (prefix, name) = split_qname(event.name().as_ref())?;
        let namespace = lookup(scope, prefix.as_deref())
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        let attributes = raw_attributes
            .into_iter()
            .map(|(key, value)| {
                let (prefix, name) = split_qname(key.as_bytes())?;
                // Unprefixed attributes carry no namespace, even under a default one.
                let namespace = prefix
                    .as_deref()
                    .and_then(|p| lookup(scope, Some(p)))
                    .map(str::to_string);
                Ok(XmlAttribute {
                    prefix,
                    namespace,
                    name,
                    value,
                })
            })
            .collect::<Result<Vec<_>, DavError>>()?;

        Ok(XmlElement {
            prefix,
            namespace,
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn attach(
        open: &mut [(XmlElement, usize)],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<()> {
        match open.last_mut() {
            Some((parent, _)) => parent.children.push(XmlNode::Element(element)),
            None if root.is_none() => *root = Some(element),
            None => return Err(DavError::Xml("multiple root elements".into()).into()),
        }
        Ok(())
    }

    fn push_text(open: &mut [(XmlElement, usize)], text: String) {
        // Text outside the root (prolog whitespace) is dropped.
        let Some((parent, _)) = open.last_mut() else {
            return;
        };
        if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
            existing.push_str(&text);
        } else if !text.is_empty() {
            parent.children.push(XmlNode::Text(text));
        }
    }

    /// Render this element as a standalone document fragment.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let mut scope: Scope = Vec::new();
        self.write_into(&mut out, &mut scope);
        out
    }

    fn write_into(&self, out: &mut String, scope: &mut Scope) {
        let mark = scope.len();
        let mut declarations: Vec<(Option<String>, String)> = Vec::new();

        let mut bind = |prefix: Option<&str>, namespace: &str, scope: &mut Scope| {
            if lookup(scope, prefix) != Some(namespace) {
                scope.push((prefix.map(str::to_string), namespace.to_string()));
                declarations.push((prefix.map(str::to_string), namespace.to_string()));
            }
        };

        match (&self.prefix, &self.namespace) {
            (prefix, Some(ns)) => bind(prefix.as_deref(), ns.as_str(), &mut *scope),
            // An unqualified element below a default namespace has to undeclare it.
            (None, None) => {
                if lookup(scope, None).is_some_and(|ns| !ns.is_empty()) {
                    bind(None, "", &mut *scope);
                }
            }
            (Some(_), None) => {}
        }
        for attr in &self.attributes {
            if let (Some(prefix), Some(ns)) = (&attr.prefix, &attr.namespace) {
                bind(Some(prefix.as_str()), ns.as_str(), &mut *scope);
            }
        }

        let qname = match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        };

        out.push('<');
        out.push_str(&qname);
        for (prefix, ns) in &declarations {
            match prefix {
                Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape_xml(ns))),
                None => out.push_str(&format!(" xmlns=\"{}\"", escape_xml(ns))),
            }
        }
        for attr in &self.attributes {
            out.push(' ');
            if let Some(prefix) = &attr.prefix {
                out.push_str(prefix);
                out.push(':');
            }
            out.push_str(&attr.name);
            out.push_str(&format!("=\"{}\"", escape_xml(&attr.value)));
        }

        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for node in &self.children {
                match node {
                    XmlNode::Text(text) => out.push_str(&escape_xml(text)),
                    XmlNode::Element(el) => el.write_into(out, scope),
                }
            }
            out.push_str("</");
            out.push_str(&qname);
            out.push('>');
        }

        scope.truncate(mark);
    }
}
