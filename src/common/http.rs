use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use crate::common::compression::{
    add_accept_encoding, decompress_body, detect_encodings, normalize_decoded_headers,
};
use crate::error::DavError;

/// Type alias for the Hyper client behind [`HyperTransport`].
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// "Send a built request, receive status, headers and an aggregated body."
///
/// This is the only thing a session needs from the network. Implementations own
/// their connection lifecycle; a session owns its transport and drops it when
/// it is closed.
pub trait DavTransport {
    /// Execute one exchange. Timing out must surface as [`DavError::Timeout`].
    fn execute(
        &self,
        request: Request<Bytes>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// Build a Hyper client configured with HTTP/2, connection pooling, and a TLS connector
/// that prefers native roots but falls back to the bundled WebPKI store.
pub fn build_hyper_client() -> Result<HyperClient> {
    let https_builder = HttpsConnectorBuilder::new()
        .with_native_roots()
        .unwrap_or_else(|err| {
            warn!("falling back to webpki roots (native roots unavailable: {err})");
            HttpsConnectorBuilder::new().with_webpki_roots()
        });

    let https = https_builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .http2_adaptive_window(true)
        .pool_max_idle_per_host(16)
        .build::<_, Full<Bytes>>(https))
}

/// Default transport: hyper 1.x over rustls with transparent response decompression.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl HyperTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_hyper_client()?,
        })
    }

    /// Wrap an existing client, e.g. one from [`build_hyper_client`] shared by
    /// several sessions so they reuse one connection pool.
    pub fn from_client(client: HyperClient) -> Self {
        Self { client }
    }
}

impl DavTransport for HyperTransport {
    fn execute(
        &self,
        request: Request<Bytes>,
        per_req_timeout: Duration,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        let client = self.client.clone();
        async move {
            let (parts, body) = request.into_parts();
            let mut req = Request::from_parts(parts, Full::new(body));
            add_accept_encoding(req.headers_mut());
            let url = req.uri().to_string();

            let resp = timeout(per_req_timeout, client.request(req))
                .await
                .map_err(|_| DavError::Timeout {
                    url: url.clone(),
                    timeout: per_req_timeout,
                })??;

            let encodings = detect_encodings(resp.headers());
            let (mut parts, body) = resp.into_parts();
            let body = decompress_body(body, &encodings).await?;
            if !encodings.is_empty() {
                debug!(%url, ?encodings, decoded_len = body.len(), "decoded response body");
                normalize_decoded_headers(&mut parts.headers, body.len());
            }

            Ok(Response::from_parts(parts, body))
        }
    }
}
