//! Websim challenge authentication library
//!
//! Provides challenge issuance, challenge resolution against the Websim
//! record store, and signed access token issue/verify for the Sonauto
//! gateway. Nothing here depends on the gateway binary, so the whole
//! authorization flow can be exercised and tested on its own.
//!
//! Authorization flow:
//! 1. Client calls `challenge::issue_challenge()` via the gateway
//! 2. Client completes verification on Websim, which writes a record
//!    `{token, username, created_at}` into the public challenge store
//! 3. Gateway calls `ChallengeResolver::resolve()` with the presented
//!    token and username
//! 4. On a match, `CredentialSigner::issue()` produces the access token
//! 5. Subsequent requests are checked with `CredentialSigner::verify()`

pub mod challenge;
pub mod constants;
pub mod credential;
pub mod error;
pub mod resolver;

pub use challenge::{Challenge, issue_challenge};
pub use constants::*;
pub use credential::{CredentialSigner, IssuedCredential};
pub use error::{Error, Result};
pub use resolver::{ChallengeRecord, ChallengeResolver};
