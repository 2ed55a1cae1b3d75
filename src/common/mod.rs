pub mod compression;
pub mod http;

pub use compression::{ContentEncoding, add_accept_encoding, decompress_body, detect_encodings};
pub use http::{DavTransport, HyperClient, HyperTransport, build_hyper_client};
