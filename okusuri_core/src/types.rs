//! Core domain types for the Okusuri system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Daily medication log entries
//! - The derived medication status
//! - Users and their notification settings
//! - Push payloads handed to the transport

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Medication Log Types
// ============================================================================

/// A single daily medication record
///
/// Several entries may exist for the same calendar day; the one with the
/// latest `recorded_at` is authoritative.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub has_bleeding: bool,
    pub recorded_at: DateTime<Utc>,
}

impl LogEntry {
    /// Create a new entry for `date`, recorded at `recorded_at`
    pub fn new(
        user_id: impl Into<String>,
        date: NaiveDate,
        has_bleeding: bool,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            date,
            has_bleeding,
            recorded_at,
        }
    }
}

/// Derived adherence status for one user
///
/// When `is_rest_period` is true, `current_streak` is always 0.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationStatus {
    pub current_streak: u32,
    pub is_rest_period: bool,
    pub rest_days_left: u32,
    pub consecutive_bleeding_days: u32,
}

// ============================================================================
// User and Notification Setting Types
// ============================================================================

/// A user known to the directory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user, per-platform notification preference
///
/// `subscription` is the opaque JSON blob registered by the client; it is only
/// parsed when a notification is about to be sent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSetting {
    pub user_id: String,
    pub platform: String,
    pub is_enabled: bool,
    pub subscription: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSetting {
    pub fn new(
        user_id: impl Into<String>,
        platform: impl Into<String>,
        subscription: impl Into<String>,
        is_enabled: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            platform: platform.into(),
            is_enabled,
            subscription: subscription.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Push Payload
// ============================================================================

/// Content handed to a push transport
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl PushPayload {
    /// Build a medication reminder payload
    ///
    /// The data map carries `messageId`, `timestamp`, `userId` and
    /// `consecutiveDays` for the client-side service worker.
    pub fn reminder(
        title: impl Into<String>,
        body: impl Into<String>,
        user_id: &str,
        consecutive_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));

        let mut data = BTreeMap::new();
        data.insert("messageId".to_string(), format!("medication-{}", nanos));
        data.insert("timestamp".to_string(), now.timestamp().to_string());
        data.insert("userId".to_string(), user_id.to_string());
        data.insert("consecutiveDays".to_string(), consecutive_days.to_string());

        Self {
            title: title.into(),
            body: body.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_serializes_camel_case() {
        let status = MedicationStatus {
            current_streak: 4,
            is_rest_period: false,
            rest_days_left: 0,
            consecutive_bleeding_days: 1,
        };
        let json = serde_json::to_value(status).unwrap();

        assert_eq!(json["currentStreak"], 4);
        assert_eq!(json["isRestPeriod"], false);
        assert_eq!(json["restDaysLeft"], 0);
        assert_eq!(json["consecutiveBleedingDays"], 1);
    }

    #[test]
    fn test_reminder_payload_data() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let payload = PushPayload::reminder("Reminder", "Take it", "user-1", 7, now);

        assert_eq!(payload.data["userId"], "user-1");
        assert_eq!(payload.data["consecutiveDays"], "7");
        assert_eq!(payload.data["timestamp"], now.timestamp().to_string());
        assert!(payload.data["messageId"].starts_with("medication-"));
    }
}
