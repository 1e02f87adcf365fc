//! Link and session lifecycle: upload tokens, share sessions, short links and
//! their resolution back to stored files.
//!
//! All expiry decisions go through [`is_expired`], evaluated against the clock
//! at the moment of access. Stored status fields are never trusted on their own.

pub mod ids;
pub mod resolver;
pub mod sessions;
pub mod tokens;
pub mod urls;

pub use ids::{Entropy, SystemEntropy};
pub use resolver::{LinkResolver, ResolvedFile};
pub use sessions::{FileLinks, SessionManager, SessionView, ShareOutcome, ShareRequest};
pub use tokens::TokenManager;
pub use urls::PublicUrls;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::layout::LayoutError;
use crate::storage::models::Expiring;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} has expired")]
    Expired(&'static str),
    #[error("Upload link has already been used")]
    AlreadyUploaded,
    #[error("Upload has already been consumed")]
    AlreadyConsumed,
    #[error("Nothing has been uploaded for this token yet")]
    NotConsumable,
    #[error("File '{0}' already exists in this session")]
    DuplicateFile(String),
    #[error("File exceeds maximum upload size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
    #[error("Invalid stored path: {0}")]
    InvalidPath(String),
    #[error("Could not generate a unique identifier after {attempts} attempts")]
    IdentifierCollision { attempts: usize },
    #[error("System random number generator failed")]
    Entropy,
    #[error("State store error: {0}")]
    Store(#[from] StoreError),
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LayoutError> for LinkError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::InvalidPath(p) => LinkError::InvalidPath(p),
            LayoutError::Io(e) => LinkError::Io(e),
        }
    }
}

impl LinkError {
    /// Expected, caller-facing outcomes as opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            LinkError::IdentifierCollision { .. }
                | LinkError::Entropy
                | LinkError::Store(_)
                | LinkError::Io(_)
        )
    }
}

/// The one expiry rule: a record is expired strictly after its `expires_at`.
pub fn is_expired<R: Expiring + ?Sized>(record: &R, now: DateTime<Utc>) -> bool {
    now > record.expires_at()
}

/// Longest TTL accepted anywhere (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Convert a TTL in seconds to a duration, clamped to [`MAX_TTL_SECS`].
pub fn ttl_from_secs(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{Token, TokenStatus};
    use chrono::Duration;
    use proptest::prelude::*;

    fn token_expiring_at(expires_at: DateTime<Utc>, status: TokenStatus) -> Token {
        Token {
            id: "t".to_string(),
            created_at: expires_at - Duration::minutes(30),
            expires_at,
            status,
            target_filename: None,
            size_bytes: None,
            description: None,
            uploaded_at: None,
            consumed_at: None,
        }
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let token = token_expiring_at(now, TokenStatus::Pending);
        assert!(!is_expired(&token, now));
        assert!(is_expired(&token, now + Duration::milliseconds(1)));
    }

    proptest! {
        #[test]
        fn lazy_expiry_overrides_stored_status(offset_ms in 1i64..10_000_000, status_idx in 0usize..3) {
            let statuses = [TokenStatus::Pending, TokenStatus::Uploaded, TokenStatus::Expired];
            let expires_at = Utc::now();
            let token = token_expiring_at(expires_at, statuses[status_idx]);
            let later = expires_at + Duration::milliseconds(offset_ms);
            prop_assert!(is_expired(&token, later));
            prop_assert_eq!(token.effective_status(later), TokenStatus::Expired);
        }

        #[test]
        fn consumed_tokens_never_report_expired(offset_ms in -10_000_000i64..10_000_000) {
            let expires_at = Utc::now();
            let token = token_expiring_at(expires_at, TokenStatus::Consumed);
            let at = expires_at + Duration::milliseconds(offset_ms);
            prop_assert_eq!(token.effective_status(at), TokenStatus::Consumed);
        }
    }

    #[test]
    fn ttl_saturates() {
        assert_eq!(ttl_from_secs(1800), Duration::minutes(30));
        assert_eq!(ttl_from_secs(u64::MAX), Duration::seconds(MAX_TTL_SECS as i64));
    }
}
