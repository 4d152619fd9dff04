use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::store::{get_json, set_json, SharedStore};

const LISTING_KEY: &str = "backupListing";

pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedListing {
    fetched_at: i64,
    directory: String,
    files: Vec<String>,
}

/// Caches the backup directory listing in the session store.
///
/// Cache failures never fail a sync: a broken entry is treated as a miss.
pub struct ListingCache {
    session: Option<SharedStore>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(session: Option<SharedStore>, ttl: Duration) -> Self {
        Self { session, ttl }
    }

    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_LISTING_TTL)
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    /// File names cached for `directory`, if still fresh.
    pub async fn get(&self, directory: &str) -> Option<Vec<String>> {
        let session = self.session.as_ref()?;
        let cached = match get_json::<CachedListing>(session.as_ref(), LISTING_KEY).await {
            Ok(cached) => cached?,
            Err(e) => {
                log::debug!("Ignoring unreadable listing cache: {}", e);
                return None;
            }
        };

        let age_ms = chrono::Utc::now().timestamp_millis() - cached.fetched_at;
        if cached.directory != directory || age_ms < 0 || age_ms as u128 >= self.ttl.as_millis() {
            return None;
        }
        Some(cached.files)
    }

    pub async fn put(&self, directory: &str, files: &[String]) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let cached = CachedListing {
            fetched_at: chrono::Utc::now().timestamp_millis(),
            directory: directory.to_string(),
            files: files.to_vec(),
        };
        if let Err(e) = set_json(session.as_ref(), LISTING_KEY, &cached).await {
            log::warn!("Failed to cache backup listing: {}", e);
        }
    }

    pub async fn invalidate(&self) {
        if let Some(session) = self.session.as_ref() {
            if let Err(e) = session.remove(LISTING_KEY).await {
                log::warn!("Failed to clear backup listing cache: {}", e);
            }
        }
    }
}
