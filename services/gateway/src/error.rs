//! Request-boundary error taxonomy
//!
//! Every failure a handler can hit maps to one variant, and every variant
//! maps to a status code and a JSON `{error}` body. Nothing propagates
//! past the request boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Gateway errors, one variant per client-visible failure class.
///
/// `NoMatch` and `Upstream` both originate in challenge resolution but
/// stay separate: a missing record is the client's failure (401), an
/// unreachable store is ours (500).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or malformed Authorization header.")]
    Unauthenticated,

    #[error("Invalid or expired access token.")]
    Forbidden,

    #[error("Authorization failed. Token/Username mismatch or challenge expired.")]
    NoMatch,

    #[error("Not Found")]
    NotFound,

    #[error("Upstream dependency failure: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NoMatch => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (
            self.status(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            GatewayError::BadRequest("missing field".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::NoMatch.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Upstream("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn no_match_message_matches_client_contract() {
        assert_eq!(
            GatewayError::NoMatch.to_string(),
            "Authorization failed. Token/Username mismatch or challenge expired."
        );
    }

    #[test]
    fn upstream_message_includes_cause() {
        let err = GatewayError::Upstream("challenge store returned 503".into());
        assert!(err.to_string().contains("challenge store returned 503"));
    }

    #[tokio::test]
    async fn response_body_is_flat_error_json() {
        let response = GatewayError::NoMatch.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(
            json["error"].is_string(),
            "body must be a flat {{error}} object, got: {json}"
        );
    }
}
