//! Challenge token issuance
//!
//! A challenge token is an opaque UUID v4 the client carries to Websim,
//! where completing verification writes a record under that token and the
//! client's username. The gateway keeps no record of issued tokens;
//! validity is established later by matching against the externally
//! written record, not by the gateway remembering what it issued. The
//! cost of that statelessness is that a fabricated token which happens to
//! match a store record is indistinguishable from an echoed one.

use chrono::Utc;
use uuid::Uuid;

use crate::constants::CHALLENGE_VALIDITY_MS;

/// A freshly issued challenge: opaque token plus its expiry as a unix
/// timestamp in milliseconds.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub token: String,
    pub expires_at: i64,
}

/// Issue a new challenge token with a fixed validity window.
///
/// UUID v4 carries 122 random bits from the OS CSPRNG, so collisions are
/// negligible across any realistic issuance volume.
pub fn issue_challenge() -> Challenge {
    Challenge {
        token: Uuid::new_v4().to_string(),
        expires_at: Utc::now().timestamp_millis() + CHALLENGE_VALIDITY_MS,
    }
}
