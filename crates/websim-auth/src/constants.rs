//! Websim authorization constants
//!
//! The Websim URL is public client configuration, not a secret: clients
//! are redirected there to complete verification. The signing secret and
//! upstream API key are managed by the gateway's config layer.

/// Websim site hosting the out-of-band verification flow and the public
/// challenge record store.
pub const WEBSIM_AUTH_URL: &str = "https://sonauto-api.on.websim.com";

/// How long a challenge may wait for its verification record, in
/// milliseconds. Records older than this never match.
pub const CHALLENGE_VALIDITY_MS: i64 = 5 * 60 * 1000;

/// Access token lifetime in seconds. Expiry is the only termination
/// mechanism; there is no revocation list.
pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 60 * 60;

/// Default number of records fetched from the challenge store per
/// resolution attempt. A legitimate match that has scrolled past this
/// window resolves as no-match.
pub const DEFAULT_LOOKBACK_LIMIT: usize = 20;
