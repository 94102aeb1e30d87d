//! Challenge resolution against the Websim record store
//!
//! Completing verification on Websim appends a record `{token, username,
//! created_at}` to a publicly readable store. Resolution fetches the most
//! recent page of records via an unauthenticated list query and scans it
//! for a row where token, username, and freshness all hold at once. The
//! lookback is bounded: a legitimate record that has scrolled out of the
//! fetched page resolves as no-match.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::constants::CHALLENGE_VALIDITY_MS;
use crate::error::{Error, Result};

/// A verification record written by the Websim flow. Read-only from the
/// gateway's perspective.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeRecord {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    rows: Vec<ChallengeRecord>,
}

/// Resolves presented challenges by querying the external record store.
pub struct ChallengeResolver {
    client: reqwest::Client,
    websim_auth_url: String,
    lookback_limit: usize,
}

impl ChallengeResolver {
    pub fn new(client: reqwest::Client, websim_auth_url: String, lookback_limit: usize) -> Self {
        Self {
            client,
            websim_auth_url,
            lookback_limit,
        }
    }

    /// Confirm that a matching, unexpired record exists for the presented
    /// token and username.
    ///
    /// Returns `Error::NoMatch` when no row in the fetched window
    /// satisfies all three conditions, and `Error::Store` when the store
    /// is unreachable, answers non-2xx, or returns an undecodable body.
    /// The two failure modes stay separate so dependency outages are
    /// never logged as failed authorizations.
    pub async fn resolve(&self, challenge_token: &str, username: &str) -> Result<()> {
        let url = format!(
            "{}/api/v1/auth_challenge_v1/list/latest?limit={}",
            self.websim_auth_url.trim_end_matches('/'),
            self.lookback_limit,
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Store(format!("challenge list request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Store(format!(
                "challenge store returned {status}"
            )));
        }

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid challenge list response: {e}")))?;

        let now = Utc::now();
        let matched = list.rows.iter().find(|row| {
            row.token == challenge_token
                && row.username == username
                && now.signed_duration_since(row.created_at).num_milliseconds()
                    < CHALLENGE_VALIDITY_MS
        });

        match matched {
            Some(row) => {
                debug!(username = %row.username, "challenge record matched");
                Ok(())
            }
            None => {
                debug!(
                    username,
                    rows = list.rows.len(),
                    "no matching unexpired challenge record in window"
                );
                Err(Error::NoMatch)
            }
        }
    }
}
