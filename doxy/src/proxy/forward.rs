//! Reverse proxy to deployment containers

use std::time::Duration;

use axum::{body::Body, extract::Request, response::Response};
use http::{header, HeaderMap, HeaderName};
use reqwest::{redirect, Client};
use tracing::{debug, warn};
use url::Url;

use crate::errors::DoxyError;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards requests to `http://<upstream_host>:<port>`
pub struct ProxyClient {
    client: Client,
    upstream_host: String,
    max_body_bytes: usize,
}

impl ProxyClient {
    /// Create a new proxy client
    pub fn new(
        upstream_host: &str,
        connect_timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<Self, DoxyError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            upstream_host: upstream_host.to_string(),
            max_body_bytes,
        })
    }

    /// Upstream URL for a port and path, keeping the query string
    pub fn upstream_url(&self, port: u16, path: &str, query: Option<&str>) -> Result<Url, DoxyError> {
        let mut url = Url::parse(&format!("http://{}:{}", self.upstream_host, port))
            .map_err(|e| DoxyError::UpstreamError(e.to_string()))?;
        url.set_path(path);
        url.set_query(query);
        Ok(url)
    }

    /// Send a request upstream and stream the response back. The request body
    /// is buffered up to the configured limit.
    pub async fn forward(&self, request: Request, port: u16, path: &str) -> Result<Response, DoxyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| DoxyError::ValidationError(format!("Could not read request body: {}", e)))?;
        let url = self.upstream_url(port, path, parts.uri.query())?;
        debug!("Proxying {} {} to {}", parts.method, parts.uri, url);

        // the original Host header is passed through unchanged
        let mut headers = strip_hop_by_hop(&parts.headers);
        if let Some(host) = parts.headers.get(header::HOST) {
            headers.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
        }

        let upstream = self
            .client
            .request(parts.method, url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Upstream {} failed: {}", url, e);
                DoxyError::UpstreamError(e.to_string())
            })?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(response_headers) = response.headers_mut() {
            *response_headers = strip_hop_by_hop(upstream.headers());
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| DoxyError::UpstreamError(e.to_string()))
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in HOP_BY_HOP.iter() {
        filtered.remove(name);
    }
    filtered.remove("keep-alive");
    filtered
}
