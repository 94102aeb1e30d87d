//! Upstream forwarding
//!
//! Rewrites the inbound path under the gateway's forwarding prefix into a
//! Sonauto API path, injects the server-held API key, and relays the
//! upstream status and body verbatim. Outbound headers are built fresh:
//! the inbound Authorization header belongs to the gateway's own trust
//! domain and never crosses this boundary. A failed outbound call fails
//! the inbound request once; there are no retries at this layer.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use common::Secret;
use tracing::{error, instrument};

use crate::error::GatewayError;
use crate::metrics;

/// Inbound path segment stripped before constructing the upstream path.
pub const FORWARD_PREFIX: &str = "/api/sonauto";

/// Headers to strip from upstream responses (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared state for the forwarding handler.
#[derive(Clone)]
pub struct ForwardState {
    pub client: reqwest::Client,
    pub upstream_base: String,
    pub api_key: Arc<Secret>,
    pub timeout: Duration,
    pub requests_total: Arc<std::sync::atomic::AtomicU64>,
    pub errors_total: Arc<std::sync::atomic::AtomicU64>,
}

/// Forward an authorized inbound request to the Sonauto API.
///
/// The request has already passed the authorization gate; `username` is
/// only used for logging.
#[instrument(skip_all, fields(request_id = %request_id, username = %username, method = %request.method(), path = %request.uri().path()))]
pub async fn forward_request(
    state: &ForwardState,
    request: axum::http::Request<axum::body::Body>,
    username: &str,
    request_id: String,
) -> Response {
    state
        .requests_total
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let method = request.method().clone();
    let uri = request.uri().clone();

    // Strip the forwarding prefix; the remainder (default "/") is the
    // upstream path under /v1.
    let path = uri.path().strip_prefix(FORWARD_PREFIX).unwrap_or("");
    let path = if path.is_empty() { "/" } else { path };
    let upstream_url = match uri.query() {
        Some(q) => format!(
            "{}/v1{}?{}",
            state.upstream_base.trim_end_matches('/'),
            path,
            q
        ),
        None => format!("{}/v1{}", state.upstream_base.trim_end_matches('/'), path),
    };

    // Outbound headers are constructed from scratch: the upstream key from
    // config, never anything derived from the inbound request.
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    let bearer = format!("Bearer {}", state.api_key.expose());
    match reqwest::header::HeaderValue::from_str(&bearer) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        Err(e) => {
            error!(error = %e, "upstream API key is not a valid header value");
            return GatewayError::Internal("invalid upstream credential configuration".into())
                .into_response();
        }
    }

    // Mutating methods relay the inbound body; GET/DELETE carry none.
    let has_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;
    let body_bytes = if has_body {
        match axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024).await {
            Ok(b) => b,
            Err(e) => {
                state
                    .errors_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                error!(error = %e, "failed to read request body");
                return GatewayError::BadRequest(format!("invalid request body: {e}"))
                    .into_response();
            }
        }
    } else {
        axum::body::Bytes::new()
    };

    let mut req = state
        .client
        .request(method, &upstream_url)
        .headers(headers)
        .timeout(state.timeout);
    if has_body {
        req = req.body(body_bytes);
    }

    match req.send().await {
        Ok(upstream_response) => {
            let status = upstream_response.status();
            let resp_headers = upstream_response.headers().clone();

            match upstream_response.bytes().await {
                Ok(resp_body) => {
                    let mut response = Response::builder().status(status);
                    for (name, value) in &resp_headers {
                        if !is_hop_by_hop(name.as_str()) {
                            response = response.header(name, value);
                        }
                    }
                    response
                        .body(axum::body::Body::from(resp_body))
                        .unwrap_or_else(|e| {
                            GatewayError::Internal(format!("response build error: {e}"))
                                .into_response()
                        })
                }
                Err(e) => {
                    state
                        .errors_total
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    metrics::record_upstream_error("sonauto");
                    error!(error = %e, "failed to read upstream response body");
                    GatewayError::Upstream(format!("upstream response read error: {e}"))
                        .into_response()
                }
            }
        }
        Err(e) => {
            state
                .errors_total
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            metrics::record_upstream_error("sonauto");
            error!(error = %e, "upstream request failed");
            GatewayError::Upstream(format!("upstream error: {e}")).into_response()
        }
    }
}

/// Check if a header is hop-by-hop (stripped from relayed responses)
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
