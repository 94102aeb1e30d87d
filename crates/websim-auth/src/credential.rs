//! Access token issue and verify
//!
//! Tokens are HS256 JWTs over `{username, authorized, iat, exp}`, signed
//! and verified with the same shared secret. Signature comparison is the
//! signing library's own constant-time check; there is no custom string
//! compare anywhere on this path. Validation runs with zero leeway so a
//! token is rejected the moment its embedded expiry passes.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::constants::ACCESS_TOKEN_LIFETIME_SECS;
use crate::error::{Error, Result};

/// Claims embedded in every issued access token.
///
/// `iat`/`exp` are unix timestamps in seconds. `authorized` is always
/// written as `true` at issuance; a token carrying `false` is rejected
/// even when its signature verifies.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    authorized: bool,
    iat: u64,
    exp: u64,
}

/// A signed access token plus the lifetime communicated to the client.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub access_token: String,
    pub expires_in: u64,
}

/// Issues and verifies access tokens under a shared signing secret.
///
/// Holds both key halves (they are the same secret) so issuance and the
/// authorization gate use one instance injected from config.
pub struct CredentialSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: u64,
}

impl CredentialSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs: ACCESS_TOKEN_LIFETIME_SECS,
        }
    }

    /// Sign an access token for a verified username.
    ///
    /// The expiration is fixed at issuance; there is no refresh and no
    /// server-side revocation.
    pub fn issue(&self, username: &str) -> Result<IssuedCredential> {
        let iat = unix_now_secs();
        let claims = Claims {
            username: username.to_owned(),
            authorized: true,
            iat,
            exp: iat + self.lifetime_secs,
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| Error::InvalidCredential(format!("token signing failed: {e}")))?;

        Ok(IssuedCredential {
            access_token,
            expires_in: self.lifetime_secs,
        })
    }

    /// Verify a presented token and return the embedded username.
    ///
    /// Fails on a bad signature, a malformed token, an elapsed expiry, or
    /// a missing `authorized` flag.
    pub fn verify(&self, token: &str) -> Result<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::InvalidCredential(e.to_string()))?;

        if !data.claims.authorized {
            return Err(Error::InvalidCredential(
                "token does not carry the authorized flag".into(),
            ));
        }

        Ok(data.claims.username)
    }
}

fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
