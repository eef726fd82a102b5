//! Collaborator interfaces for logs, users and notification settings.
//!
//! The core never talks to storage directly; it goes through these traits.
//! [`crate::json_store::JsonStore`] is the bundled file-backed implementation.

use crate::{LogEntry, NotificationSetting, Result, User};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Source of per-user daily medication logs
pub trait LogStore: Send + Sync {
    /// All log entries for a user, in no particular order
    fn logs_for_user(&self, user_id: &str) -> Result<Vec<LogEntry>>;

    /// Persist a new log entry
    fn append_log(&self, entry: &LogEntry) -> Result<()>;

    /// Change the bleeding flag of an existing entry owned by `user_id`
    ///
    /// Fails with [`crate::Error::NotFound`] when no such entry exists.
    fn update_bleeding(&self, user_id: &str, id: Uuid, has_bleeding: bool) -> Result<LogEntry>;
}

/// Source of all known users
pub trait UserDirectory: Send + Sync {
    fn all_users(&self) -> Result<Vec<User>>;
}

/// Source of notification settings
pub trait SettingsStore: Send + Sync {
    fn all_settings(&self) -> Result<Vec<NotificationSetting>>;

    /// The user's most recently updated setting, if any
    fn setting_for_user(&self, user_id: &str) -> Result<Option<NotificationSetting>> {
        let settings = self.all_settings()?;
        Ok(latest_setting(
            settings.into_iter().filter(|s| s.user_id == user_id),
        ))
    }

    /// Insert or replace the setting for `(user_id, platform)`
    fn save_setting(&self, setting: NotificationSetting) -> Result<()>;
}

/// Keep whichever setting was updated last; `current` wins a tie
pub fn newer_setting(
    current: NotificationSetting,
    candidate: NotificationSetting,
) -> NotificationSetting {
    if candidate.updated_at > current.updated_at {
        candidate
    } else {
        current
    }
}

/// Pick the setting with the latest `updated_at`
///
/// On equal timestamps the setting seen first is kept.
pub fn latest_setting(
    settings: impl IntoIterator<Item = NotificationSetting>,
) -> Option<NotificationSetting> {
    settings.into_iter().reduce(newer_setting)
}

/// Record a dose for `user_id`
///
/// `date` defaults to the calendar day of `now`.
pub fn record_log(
    store: &dyn LogStore,
    user_id: &str,
    date: Option<NaiveDate>,
    has_bleeding: bool,
    now: DateTime<Utc>,
) -> Result<LogEntry> {
    let entry = LogEntry::new(
        user_id,
        date.unwrap_or_else(|| now.date_naive()),
        has_bleeding,
        now,
    );
    store.append_log(&entry)?;
    tracing::info!(
        user_id,
        date = %entry.date,
        has_bleeding,
        "Recorded medication log {}",
        entry.id
    );
    Ok(entry)
}
