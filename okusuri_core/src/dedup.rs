//! In-memory suppression of duplicate push sends.
//!
//! Records when each subscription key was last sent to. A key sent to within
//! the dedup window is reported as recently sent; records older than the
//! retention period are swept whenever a send is recorded.
//!
//! The table lives only in memory and is lost on restart.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Default window during which repeated sends are suppressed
pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 5;

/// Default age after which records are swept
pub const DEFAULT_RETENTION_MINUTES: i64 = 60;

/// Thread-safe map of subscription key to last send time
///
/// Share between concurrent dispatch runs with an `Arc`.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    retention: Duration,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(
            Duration::minutes(DEFAULT_DEDUP_WINDOW_MINUTES),
            Duration::minutes(DEFAULT_RETENTION_MINUTES),
        )
    }
}

impl DedupCache {
    pub fn new(window: Duration, retention: Duration) -> Self {
        Self {
            window,
            retention,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Build a cache from notification config
    pub fn from_config(config: &crate::config::NotificationConfig) -> Self {
        Self::new(
            Duration::minutes(config.dedup_window_minutes),
            Duration::minutes(config.retention_minutes),
        )
    }

    /// True iff `key` was marked sent less than one window before `now`
    pub fn is_recently_sent(&self, key: &str, now: DateTime<Utc>) -> bool {
        let last_sent = self.last_sent.lock().get(key).copied();
        match last_sent {
            Some(at) => now.signed_duration_since(at) < self.window,
            None => false,
        }
    }

    /// Record a send to `key` at `now` and sweep expired records
    pub fn mark_sent(&self, key: &str, now: DateTime<Utc>) {
        let swept = {
            let mut table = self.last_sent.lock();
            table.insert(key.to_string(), now);

            let before = table.len();
            table.retain(|_, at| now.signed_duration_since(*at) <= self.retention);
            before - table.len()
        };

        if swept > 0 {
            tracing::debug!("Swept {} expired dedup records", swept);
        }
    }

    /// Last recorded send for `key`, if still retained
    pub fn last_sent(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last_sent.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
