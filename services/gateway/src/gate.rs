//! Authorization gate for forwarded requests
//!
//! Runs to completion before the forwarding router is invoked: a rejected
//! request never produces an upstream call, so authorization failures
//! cannot consume upstream quota or leak the injected API key.

use axum::http::HeaderMap;
use tracing::debug;
use websim_auth::CredentialSigner;

use crate::error::GatewayError;

/// Check the bearer credential on an inbound forwarding request.
///
/// Missing or non-bearer-shaped header is `Unauthenticated` (401); a
/// present token that fails verification is `Forbidden` (403). On success
/// returns the username embedded in the credential.
pub fn authorize(headers: &HeaderMap, signer: &CredentialSigner) -> Result<String, GatewayError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthenticated)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::Unauthenticated)?;

    match signer.verify(token) {
        Ok(username) => Ok(username),
        Err(e) => {
            debug!(error = %e, "access token rejected");
            Err(GatewayError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signer() -> CredentialSigner {
        CredentialSigner::new("gate-test-secret")
    }

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let result = authorize(&HeaderMap::new(), &signer());
        assert!(matches!(result, Err(GatewayError::Unauthenticated)));
    }

    #[test]
    fn non_bearer_header_is_unauthenticated() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        let result = authorize(&headers, &signer());
        assert!(matches!(result, Err(GatewayError::Unauthenticated)));
    }

    #[test]
    fn garbage_bearer_token_is_forbidden() {
        let headers = headers_with_auth("Bearer not-a-real-token");
        let result = authorize(&headers, &signer());
        assert!(matches!(result, Err(GatewayError::Forbidden)));
    }

    #[test]
    fn token_signed_under_other_secret_is_forbidden() {
        let other = CredentialSigner::new("some-other-secret");
        let issued = other.issue("alice").unwrap();
        let headers = headers_with_auth(&format!("Bearer {}", issued.access_token));

        let result = authorize(&headers, &signer());
        assert!(
            matches!(result, Err(GatewayError::Forbidden)),
            "wrong-secret credential must be forbidden, not unauthenticated"
        );
    }

    #[test]
    fn valid_token_yields_username() {
        let signer = signer();
        let issued = signer.issue("alice").unwrap();
        let headers = headers_with_auth(&format!("Bearer {}", issued.access_token));

        assert_eq!(authorize(&headers, &signer).unwrap(), "alice");
    }
}
