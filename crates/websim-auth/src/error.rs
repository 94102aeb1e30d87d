//! Error types for challenge authorization operations

/// Errors from challenge resolution and credential operations.
///
/// `NoMatch` and `Store` are deliberately separate variants: a missing
/// record is an authorization failure, an unreachable store is a
/// dependency failure, and the two must stay distinguishable in logs even
/// where they collapse to the same client-facing status.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("no matching unexpired challenge record")]
    NoMatch,

    #[error("challenge store error: {0}")]
    Store(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
