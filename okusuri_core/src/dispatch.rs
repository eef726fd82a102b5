//! Reminder fan-out across all users.
//!
//! One dispatch run:
//! 1. Reduces all settings to the latest-updated one per user
//! 2. Skips users without an enabled setting and subscription
//! 3. Sends each subscription at most once per run
//! 4. Composes a status-aware message and consults the dedup cache
//! 5. Marks the subscription sent only after the transport succeeds
//!
//! Per-recipient failures are logged and counted; they never abort the run.
//! Failing to fetch users or settings does.

use crate::dedup::DedupCache;
use crate::message::compose_message;
use crate::status::medication_status;
use crate::store::{newer_setting, LogStore, SettingsStore, UserDirectory};
use crate::subscription::{preview, PushSubscription};
use crate::transport::PushTransport;
use crate::{MedicationStatus, NotificationSetting, PushPayload, Result, User};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Default notification title
pub const DEFAULT_TITLE: &str = "Medication reminder";

/// Outcome of one dispatch run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Distinct subscriptions successfully sent to
    pub sent_count: usize,
    /// Users with no setting, a disabled setting or an empty subscription
    pub skipped_disabled: usize,
    /// Users whose subscription was already sent to earlier in this run
    pub skipped_shared: usize,
    /// Users whose subscription was sent to within the dedup window
    pub skipped_recent: usize,
    /// Users whose subscription or delivery failed
    pub failed: usize,
}

/// Coordinates one reminder run over its collaborators
pub struct DispatchCoordinator<'a> {
    users: &'a dyn UserDirectory,
    settings: &'a dyn SettingsStore,
    logs: &'a dyn LogStore,
    transport: &'a dyn PushTransport,
    dedup: &'a DedupCache,
    title: String,
}

impl<'a> DispatchCoordinator<'a> {
    pub fn new(
        users: &'a dyn UserDirectory,
        settings: &'a dyn SettingsStore,
        logs: &'a dyn LogStore,
        transport: &'a dyn PushTransport,
        dedup: &'a DedupCache,
    ) -> Self {
        Self {
            users,
            settings,
            logs,
            transport,
            dedup,
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Override the notification title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Fetch users and settings, then notify everyone eligible
    pub fn dispatch(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let users = self.users.all_users()?;
        let settings = self.settings.all_settings()?;
        Ok(self.dispatch_to(&users, settings, now))
    }

    /// Notify `users` according to `settings`
    pub fn dispatch_to(
        &self,
        users: &[User],
        settings: Vec<NotificationSetting>,
        now: DateTime<Utc>,
    ) -> DispatchReport {
        let setting_count = settings.len();
        let active = active_settings(settings);
        tracing::info!(
            "Dispatch started: {} users, {} settings, {} active",
            users.len(),
            setting_count,
            active.len()
        );

        let mut report = DispatchReport::default();
        let mut sent_this_run: HashSet<String> = HashSet::new();

        for user in users {
            let Some(setting) = active.get(&user.id) else {
                tracing::debug!(user_id = %user.id, "No notification setting");
                report.skipped_disabled += 1;
                continue;
            };
            if !setting.is_enabled || setting.subscription.trim().is_empty() {
                tracing::debug!(user_id = %user.id, "Notifications disabled");
                report.skipped_disabled += 1;
                continue;
            }

            let subscription = match PushSubscription::parse(&setting.subscription) {
                Ok(subscription) => subscription,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        subscription = %preview(&setting.subscription),
                        "Skipping recipient: {}",
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };

            if sent_this_run.contains(subscription.key()) {
                tracing::debug!(
                    user_id = %user.id,
                    endpoint = %subscription.preview(),
                    "Subscription already notified in this run"
                );
                report.skipped_shared += 1;
                continue;
            }

            let status = self.status_for(&user.id, now);
            let message = compose_message(&status);

            if self.dedup.is_recently_sent(subscription.key(), now) {
                tracing::debug!(
                    user_id = %user.id,
                    endpoint = %subscription.preview(),
                    "Subscription notified recently, skipping"
                );
                report.skipped_recent += 1;
                continue;
            }

            let payload =
                PushPayload::reminder(&self.title, message, &user.id, status.current_streak, now);

            match self.transport.send(&subscription, &payload) {
                Ok(()) => {
                    self.dedup.mark_sent(subscription.key(), now);
                    sent_this_run.insert(subscription.key().to_string());
                    tracing::info!(
                        user_id = %user.id,
                        endpoint = %subscription.preview(),
                        "Notification sent"
                    );
                }
                Err(e) if e.is_per_recipient() => {
                    tracing::warn!(
                        user_id = %user.id,
                        endpoint = %subscription.preview(),
                        "Notification failed: {}",
                        e
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        endpoint = %subscription.preview(),
                        "Transport error: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report.sent_count = sent_this_run.len();
        tracing::info!(
            "Dispatch finished: {} sent, {} failed",
            report.sent_count,
            report.failed
        );
        report
    }

    /// Status used for the message; falls back to the default on store failure
    fn status_for(&self, user_id: &str, now: DateTime<Utc>) -> MedicationStatus {
        match medication_status(self.logs, user_id, now) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(user_id, "Using plain reminder, status unavailable: {}", e);
                MedicationStatus::default()
            }
        }
    }
}

/// Reduce settings to the latest-updated one per user
///
/// On equal `updated_at` the setting seen first is kept, so the result is
/// deterministic for a given input order.
pub fn active_settings(
    settings: impl IntoIterator<Item = NotificationSetting>,
) -> BTreeMap<String, NotificationSetting> {
    let mut active: BTreeMap<String, NotificationSetting> = BTreeMap::new();
    for setting in settings {
        let best = match active.remove(&setting.user_id) {
            Some(current) => newer_setting(current, setting),
            None => setting,
        };
        active.insert(best.user_id.clone(), best);
    }
    active
}
