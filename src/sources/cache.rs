//! Time-keyed connector cache
//!
//! One namespace directory per connector, one JSON file per subject key.
//! Each entry carries its own `stored_at` stamp so freshness is judged
//! against the injected clock, not filesystem metadata. A corrupt or
//! unreadable entry is treated as a miss — the caller falls back to a live
//! fetch and the failure is logged, never surfaced.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::Clock;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    stored_at: DateTime<Utc>,
    payload: T,
}

/// TTL file cache for one connector namespace
pub struct TtlCache {
    dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(root: &Path, namespace: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: root.join(namespace),
            ttl,
            clock,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    /// Fresh read: present, parseable, and younger than the TTL
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry(key, false)
    }

    /// Stale-tolerant read: present and parseable, any age.
    ///
    /// Used by the exclusion connector to reuse an old snapshot when the
    /// download fails.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry(key, true)
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &str, allow_stale: bool) -> Option<T> {
        let path = self.entry_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return None,
        };
        let envelope: Envelope<T> = match serde_json::from_str(&content) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Unreadable cache entry {} ({e}); refetching", path.display());
                return None;
            }
        };
        if !allow_stale {
            let age = self
                .clock
                .now()
                .signed_duration_since(envelope.stored_at)
                .to_std()
                .unwrap_or(Duration::MAX);
            if age >= self.ttl {
                return None;
            }
        }
        Some(envelope.payload)
    }

    /// Best-effort write; a failure is logged and ignored
    pub fn put<T: Serialize>(&self, key: &str, payload: &T) {
        let envelope = Envelope {
            stored_at: self.clock.now(),
            payload,
        };
        let json = match serde_json::to_string(&envelope) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry for {key}: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!("Failed to create cache dir {}: {e}", self.dir.display());
            return;
        }
        if let Err(e) = std::fs::write(self.entry_path(key), json) {
            tracing::warn!("Failed to write cache entry for {key}: {e}");
        }
    }
}

/// Restrict cache keys to filesystem-safe characters
fn sanitize_key(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    safe.chars().take(50).collect()
}
