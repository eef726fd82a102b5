//! Reminder message text derived from a medication status.

use crate::MedicationStatus;

const REMINDER: &str = "Time to take your medication. Don't forget!";
const REST_ENDED: &str = "Your rest period has ended. Resume your medication today.";

/// Compose the notification body for `status`
///
/// Rest period messages take priority over streak reminders.
pub fn compose_message(status: &MedicationStatus) -> String {
    if status.is_rest_period {
        if status.rest_days_left > 0 {
            return format!(
                "You are in a rest period. {} {} remaining before you resume your medication.",
                status.rest_days_left,
                if status.rest_days_left == 1 { "day" } else { "days" }
            );
        }
        return REST_ENDED.to_string();
    }

    if status.current_streak > 0 {
        return format!("{} (day {} in a row)", REMINDER, status.current_streak);
    }

    REMINDER.to_string()
}
