pub mod capabilities;
pub mod lock;
pub mod proppatch;
pub mod session;
pub mod transfer;
pub mod types;
pub mod verbs;
pub mod xml;

pub use lock::LockState;
pub use proppatch::{READ_ONLY_PROPERTIES, build_proppatch_body, synthesize_propertyupdate};
pub use session::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, DavSession};
pub use types::{AuthPolicy, Content, Credentials, Depth, parent_url, resolve_uri};
pub use xml::{NS_CALDAV, NS_DAV, XmlElement, XmlNode, escape_xml};
