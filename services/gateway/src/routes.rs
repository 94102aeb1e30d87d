//! Route surface and handlers
//!
//! Three groups of routes share one router: the challenge/verify
//! authorization endpoints under `/api/auth`, the credential-gated
//! forwarding surface under `/api/sonauto`, and the health/metrics
//! endpoints. Anything else, unknown paths and unknown methods on known
//! paths alike, answers 404 with a JSON error body.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{debug, info, warn};

use websim_auth::{ChallengeResolver, CredentialSigner, issue_challenge};

use crate::cors;
use crate::error::GatewayError;
use crate::gate;
use crate::metrics::{self, ServiceMetrics};
use crate::proxy::{self, ForwardState};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub signer: Arc<CredentialSigner>,
    pub resolver: Arc<ChallengeResolver>,
    pub forward: ForwardState,
    pub websim_auth_url: String,
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The CORS layer wraps everything (OPTIONS preflights never reach
/// routing) and the concurrency limit caps in-flight requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/auth/challenge",
            get(challenge_handler).post(challenge_handler),
        )
        .route("/api/auth/verify", post(verify_handler))
        .route("/api/sonauto", any(forward_handler))
        .route("/api/sonauto/{*path}", any(forward_handler))
        .fallback(not_found_handler)
        .method_not_allowed_fallback(not_found_handler)
        .layer(axum::middleware::from_fn(cors::apply))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

fn json_ok(body: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// GET/POST /api/auth/challenge: issue a challenge token for the client
/// to carry through the Websim verification flow.
async fn challenge_handler(State(state): State<AppState>) -> Response {
    let challenge = issue_challenge();
    debug!(expires_at = challenge.expires_at, "challenge issued");

    json_ok(serde_json::json!({
        "challenge_token": challenge.token,
        "challenge_expires_at": challenge.expires_at,
        "websim_auth_url": state.websim_auth_url,
    }))
}

/// Request body for the verify endpoint. Fields are optional so a missing
/// or malformed body maps to the 400 contract instead of an extractor
/// rejection.
#[derive(Debug, Default, Deserialize)]
struct VerifyRequest {
    challenge_token: Option<String>,
    username: Option<String>,
}

/// POST /api/auth/verify: resolve the presented challenge against the
/// record store and issue an access token on a match.
async fn verify_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: VerifyRequest = serde_json::from_slice(&body).unwrap_or_default();
    let (Some(challenge_token), Some(username)) = (
        request.challenge_token.filter(|t| !t.is_empty()),
        request.username.filter(|u| !u.is_empty()),
    ) else {
        return GatewayError::BadRequest("Missing challenge_token or username.".into())
            .into_response();
    };

    match state.resolver.resolve(&challenge_token, &username).await {
        Ok(()) => {}
        Err(websim_auth::Error::NoMatch) => {
            info!(username, "challenge verification failed");
            return GatewayError::NoMatch.into_response();
        }
        Err(websim_auth::Error::Store(msg)) => {
            metrics::record_upstream_error("websim");
            warn!(error = %msg, "challenge store unavailable");
            return GatewayError::Upstream(msg).into_response();
        }
        Err(e) => {
            return GatewayError::Internal(e.to_string()).into_response();
        }
    }

    match state.signer.issue(&username) {
        Ok(issued) => {
            info!(username, "access token issued");
            json_ok(serde_json::json!({
                "access_token": issued.access_token,
                "token_type": "Bearer",
                "expires_in": issued.expires_in,
                "username": username,
            }))
        }
        Err(e) => GatewayError::Internal(format!("token signing failed: {e}")).into_response(),
    }
}

/// Catch-all under /api/sonauto: gate first, forward second. The gate
/// runs to completion before any upstream call; a rejection here never
/// consumes upstream quota.
async fn forward_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = match gate::authorize(request.headers(), &state.signer) {
        Ok(username) => {
            proxy::forward_request(&state.forward, request, &username, request_id).await
        }
        Err(e) => {
            let reason = match &e {
                GatewayError::Unauthenticated => "missing_credential",
                _ => "invalid_credential",
            };
            metrics::record_auth_failure(reason);
            debug!(reason, "forwarding request rejected at the gate");
            e.into_response()
        }
    };

    metrics::record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Health endpoint: process status, uptime, request counters.
async fn health_handler(State(state): State<AppState>) -> Response {
    json_ok(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
    }))
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
        .into_response()
}

async fn not_found_handler() -> Response {
    GatewayError::NotFound.into_response()
}
