use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything with a hard expiry timestamp.
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Lifecycle of an upload token.
///
/// `Expired` is never a stored transition in normal operation: it is what a
/// read reports once `expires_at` has passed and the token was not consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Pending,
    Uploaded,
    Consumed,
    Expired,
}

/// A single-use upload grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Stored as the table key, not inside the record.
    #[serde(skip)]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: TokenStatus,
    #[serde(default)]
    pub target_filename: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Status as observed at `now`, applying lazy expiry.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.status != TokenStatus::Consumed && now > self.expires_at {
            TokenStatus::Expired
        } else {
            self.status
        }
    }
}

impl Expiring for Token {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// A file published in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    /// Path relative to the storage root, `/`-separated.
    pub stored_path: String,
    pub display_name: String,
}

/// A time-limited bundle of downloadable files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip)]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<SessionFile>,
    /// short key -> display name
    #[serde(default)]
    pub short_links: BTreeMap<String, String>,
}

impl Session {
    pub fn file(&self, display_name: &str) -> Option<&SessionFile> {
        self.files.iter().find(|f| f.display_name == display_name)
    }

    /// The first short key pointing at `display_name`, if any.
    pub fn short_key_for(&self, display_name: &str) -> Option<&str> {
        self.short_links
            .iter()
            .find(|(_, name)| name.as_str() == display_name)
            .map(|(key, _)| key.as_str())
    }
}

impl Expiring for Session {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
