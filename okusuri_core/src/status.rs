//! Medication status calculation.
//!
//! Derives a [`MedicationStatus`] from a user's daily logs:
//! - Logs are collapsed to one authoritative record per calendar day
//! - Three or more consecutive bleeding days start a rest period that lasts
//!   until the end of the fourth day after the first bleeding day
//! - While resting, no streak is reported; afterwards the streak restarts
//!
//! Everything here is pure. `now` is always supplied by the caller.

use crate::{LogEntry, LogStore, MedicationStatus, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Consecutive bleeding days that trigger a rest period
pub const REST_TRIGGER_DAYS: u32 = 3;

/// Days between the first bleeding day and the last day of the rest period
pub const REST_PERIOD_DAYS: i64 = 4;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// The authoritative record for one calendar day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub has_bleeding: bool,
}

/// A run of consecutive bleeding days
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BleedingRun {
    pub newest: NaiveDate,
    pub oldest: NaiveDate,
    pub days: u32,
    /// A non-bleeding day was logged after this run
    pub followed_by_clean_day: bool,
}

impl BleedingRun {
    fn starting_at(date: NaiveDate, followed_by_clean_day: bool) -> Self {
        Self {
            newest: date,
            oldest: date,
            days: 1,
            followed_by_clean_day,
        }
    }

    fn continues_with(&self, date: NaiveDate) -> bool {
        self.oldest.signed_duration_since(date).num_days() == 1
    }

    pub fn triggers_rest(&self) -> bool {
        self.days >= REST_TRIGGER_DAYS
    }

    pub fn rest_window(&self) -> RestWindow {
        RestWindow::starting(self.oldest)
    }
}

/// The rest period implied by a qualifying bleeding run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestWindow {
    pub start: NaiveDate,
    pub last_day: NaiveDate,
}

impl RestWindow {
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            last_day: start + Duration::days(REST_PERIOD_DAYS),
        }
    }

    /// Last second of the final rest day
    pub fn ends_at(&self) -> DateTime<Utc> {
        let next_midnight = NaiveDateTime::from(self.last_day + Duration::days(1));
        Utc.from_utc_datetime(&next_midnight) - Duration::seconds(1)
    }

    /// Whole days left (rounded up), or `None` once the window has passed
    pub fn days_left(&self, now: DateTime<Utc>) -> Option<u32> {
        let remaining = self.ends_at().signed_duration_since(now).num_seconds();
        if remaining <= 0 {
            return None;
        }
        let days = (remaining + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        Some(u32::try_from(days).unwrap_or(u32::MAX))
    }

    /// Whether `date` falls on or before the final rest day
    pub fn covers(&self, date: NaiveDate) -> bool {
        date <= self.last_day
    }
}

/// Compute the medication status for a set of logs at `now`
///
/// Never fails: an empty log set yields the default status.
pub fn compute_status(logs: &[LogEntry], now: DateTime<Utc>) -> MedicationStatus {
    let days = collapse_by_day(logs);
    if days.is_empty() {
        return MedicationStatus::default();
    }

    let runs = bleeding_runs(&days);
    let consecutive_bleeding_days = current_run(&runs).map_or(0, |run| run.days);

    // One window decides both the rest period and the streak cutoff
    let window = last_rest_window(&runs);

    if let Some(rest_days_left) = window.and_then(|w| w.days_left(now)) {
        return MedicationStatus {
            current_streak: 0,
            is_rest_period: true,
            rest_days_left,
            consecutive_bleeding_days,
        };
    }

    MedicationStatus {
        current_streak: count_streak(&days, window, now.date_naive()),
        is_rest_period: false,
        rest_days_left: 0,
        consecutive_bleeding_days,
    }
}

/// Load a user's logs from the store and compute their status
///
/// Store failures propagate; no partial status is returned.
pub fn medication_status(
    store: &dyn LogStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<MedicationStatus> {
    let logs = store.logs_for_user(user_id)?;
    let status = compute_status(&logs, now);
    tracing::debug!(
        user_id,
        logs = logs.len(),
        streak = status.current_streak,
        rest = status.is_rest_period,
        "Computed medication status"
    );
    Ok(status)
}

/// The authoritative entry for each calendar day, keyed by date
///
/// The entry with the latest `recorded_at` wins; on a tie the entry seen
/// first is kept.
pub fn latest_per_day(logs: &[LogEntry]) -> BTreeMap<NaiveDate, &LogEntry> {
    let mut by_day: BTreeMap<NaiveDate, &LogEntry> = BTreeMap::new();
    for entry in logs {
        match by_day.entry(entry.date) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                if entry.recorded_at > slot.get().recorded_at {
                    slot.insert(entry);
                }
            }
        }
    }
    by_day
}

/// Collapse logs to one record per calendar day, newest day first
pub fn collapse_by_day(logs: &[LogEntry]) -> Vec<DailyLog> {
    latest_per_day(logs)
        .into_iter()
        .rev()
        .map(|(date, entry)| DailyLog {
            date,
            has_bleeding: entry.has_bleeding,
        })
        .collect()
}

/// Split newest-first days into bleeding runs, newest run first
///
/// A run ends at a missing day or at a non-bleeding day.
pub fn bleeding_runs(days: &[DailyLog]) -> Vec<BleedingRun> {
    let mut runs = Vec::new();
    let mut current: Option<BleedingRun> = None;
    let mut seen_clean_day = false;

    for day in days {
        if !day.has_bleeding {
            runs.extend(current.take());
            seen_clean_day = true;
            continue;
        }

        current = match current.take() {
            Some(mut run) if run.continues_with(day.date) => {
                run.oldest = day.date;
                run.days += 1;
                Some(run)
            }
            Some(run) => {
                runs.push(run);
                Some(BleedingRun::starting_at(day.date, seen_clean_day))
            }
            None => Some(BleedingRun::starting_at(day.date, seen_clean_day)),
        };
    }
    runs.extend(current);

    runs
}

/// The bleeding run counted as "current"
///
/// Only bleeding days logged before the first clean day are considered. A gap
/// among them restarts the count, so the oldest such run is the current one.
fn current_run(runs: &[BleedingRun]) -> Option<BleedingRun> {
    runs.iter()
        .take_while(|run| !run.followed_by_clean_day)
        .last()
        .copied()
}

/// Rest window of the most recent qualifying run anywhere in the history
///
/// A later clean day does not shorten the window.
fn last_rest_window(runs: &[BleedingRun]) -> Option<RestWindow> {
    runs.iter()
        .find(|run| run.triggers_rest())
        .map(BleedingRun::rest_window)
}

/// Count consecutive logged days ending today or yesterday
///
/// Days covered by `cutoff` never count. Future-dated days are ignored.
fn count_streak(days: &[DailyLog], cutoff: Option<RestWindow>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut streak = 0;
    let mut last_counted = today;

    for day in days.iter().filter(|d| d.date <= today) {
        if cutoff.is_some_and(|window| window.covers(day.date)) {
            break;
        }

        let chains = day.date == today
            || day.date == yesterday
            || last_counted.signed_duration_since(day.date).num_days() == 1;
        if !chains {
            break;
        }

        streak += 1;
        last_counted = day.date;
    }

    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(h, min, s).unwrap())
    }

    fn entry(day: NaiveDate, has_bleeding: bool) -> LogEntry {
        LogEntry::new("user-1", day, has_bleeding, at(day, 8, 0, 0))
    }

    /// Logs `days_ago` relative to `today`, each with a bleeding flag
    fn history(today: NaiveDate, days: &[(i64, bool)]) -> Vec<LogEntry> {
        days.iter()
            .map(|&(ago, bleeding)| entry(today - Duration::days(ago), bleeding))
            .collect()
    }

    #[test]
    fn test_empty_logs_give_default_status() {
        let now = at(date(2025, 6, 10), 12, 0, 0);
        let status = compute_status(&[], now);

        assert_eq!(status, MedicationStatus::default());
        assert_eq!(status.current_streak, 0);
        assert!(!status.is_rest_period);
        assert_eq!(status.rest_days_left, 0);
        assert_eq!(status.consecutive_bleeding_days, 0);
    }

    #[test]
    fn test_three_bleeding_days_start_rest_period() {
        let last = date(2025, 6, 10);
        let logs = history(last, &[(2, true), (1, true), (0, true)]);
        let now = at(last, 23, 59, 59);

        let status = compute_status(&logs, now);

        // Rest ends at the end of 06-12 (06-08 + 4 days), exactly two days away
        assert!(status.is_rest_period);
        assert_eq!(status.rest_days_left, 2);
        assert_eq!(status.consecutive_bleeding_days, 3);
        assert_eq!(status.current_streak, 0);
    }

    #[test]
    fn test_rest_days_left_rounds_up() {
        let last = date(2025, 6, 10);
        let logs = history(last, &[(2, true), (1, true), (0, true)]);
        let now = at(last, 9, 0, 0);

        let status = compute_status(&logs, now);

        assert!(status.is_rest_period);
        assert_eq!(status.rest_days_left, 3);
    }

    #[test]
    fn test_three_clean_days_make_streak_of_three() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(0, false), (1, false), (2, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.current_streak, 3);
        assert!(!status.is_rest_period);
        assert_eq!(status.consecutive_bleeding_days, 0);
    }

    #[test]
    fn test_gap_breaks_streak() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(0, false), (2, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.current_streak, 1);
    }

    #[test]
    fn test_streak_can_end_yesterday() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(1, false), (2, false), (3, false)]);

        let status = compute_status(&logs, at(today, 7, 0, 0));

        assert_eq!(status.current_streak, 3);
    }

    #[test]
    fn test_stale_logs_give_zero_streak() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(2, false), (3, false), (4, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.current_streak, 0);
    }

    #[test]
    fn test_bleeding_days_count_toward_streak() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(0, true), (1, true), (2, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.current_streak, 3);
        assert_eq!(status.consecutive_bleeding_days, 2);
        assert!(!status.is_rest_period);
    }

    #[test]
    fn test_expired_rest_period_resets_streak() {
        let today = date(2025, 6, 20);
        // Bleeding 06-10..06-12, rest through 06-14, then daily logs again
        let mut days: Vec<(i64, bool)> = vec![(10, true), (9, true), (8, true)];
        days.extend((0..=7).map(|ago| (ago, false)));
        let logs = history(today, &days);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert!(!status.is_rest_period);
        // 06-15 through 06-20
        assert_eq!(status.current_streak, 6);
        assert_eq!(status.consecutive_bleeding_days, 0);
    }

    #[test]
    fn test_expired_rest_period_is_not_retriggered() {
        let last = date(2025, 6, 10);
        let logs = history(last, &[(2, true), (1, true), (0, true)]);
        let now = at(last + Duration::days(3), 0, 0, 0);

        let status = compute_status(&logs, now);

        assert!(!status.is_rest_period);
        assert_eq!(status.rest_days_left, 0);
        assert_eq!(status.consecutive_bleeding_days, 3);
        assert_eq!(status.current_streak, 0);
    }

    #[test]
    fn test_bleeding_gap_restarts_count() {
        let today = date(2025, 6, 10);
        // Most recent bleeding day is isolated by a gap; the older run is counted
        let logs = history(today, &[(0, true), (2, true), (3, true), (4, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.consecutive_bleeding_days, 2);
        assert!(!status.is_rest_period);
    }

    #[test]
    fn test_clean_latest_day_means_no_bleeding_count() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(0, false), (1, true), (2, true), (3, true)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.consecutive_bleeding_days, 0);
        // Rest window from 06-07 runs through 06-11 despite today's clean log
        assert!(status.is_rest_period);
        assert_eq!(status.rest_days_left, 2);
        assert_eq!(status.current_streak, 0);
    }

    #[test]
    fn test_newest_qualifying_run_sets_rest_after_gap() {
        let today = date(2025, 6, 10);
        // 06-08..06-10 bleeding, gap on 06-07, then 06-04..06-06 bleeding
        let logs = history(
            today,
            &[(0, true), (1, true), (2, true), (4, true), (5, true), (6, true)],
        );

        let status = compute_status(&logs, at(today, 12, 0, 0));

        // Window 06-08..06-12 ends in 2.5 days
        assert!(status.is_rest_period);
        assert_eq!(status.rest_days_left, 3);
        assert_eq!(status.current_streak, 0);
        // The gap restarts the count at the older run
        assert_eq!(status.consecutive_bleeding_days, 3);
    }

    #[test]
    fn test_latest_write_wins_within_a_day() {
        let today = date(2025, 6, 10);
        let mut logs = history(today, &[(1, true), (2, true)]);
        logs.push(LogEntry::new("user-1", today, false, at(today, 7, 0, 0)));
        logs.push(LogEntry::new("user-1", today, true, at(today, 21, 0, 0)));

        let status = compute_status(&logs, at(today, 22, 0, 0));

        assert!(status.is_rest_period);
        assert_eq!(status.consecutive_bleeding_days, 3);
    }

    #[test]
    fn test_equal_timestamps_keep_first_entry() {
        let today = date(2025, 6, 10);
        let recorded = at(today, 9, 0, 0);
        let logs = vec![
            LogEntry::new("user-1", today, false, recorded),
            LogEntry::new("user-1", today, true, recorded),
        ];

        let days = collapse_by_day(&logs);

        assert_eq!(days.len(), 1);
        assert!(!days[0].has_bleeding);
    }

    #[test]
    fn test_collapse_sorts_newest_first() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(3, false), (0, false), (1, true)]);

        let days = collapse_by_day(&logs);
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();

        assert_eq!(
            dates,
            vec![today, today - Duration::days(1), today - Duration::days(3)]
        );
    }

    #[test]
    fn test_bleeding_runs_split_on_gap_and_clean_day() {
        let today = date(2025, 6, 10);
        let logs = history(
            today,
            &[(0, true), (1, true), (3, true), (4, false), (5, true), (6, true)],
        );
        let days = collapse_by_day(&logs);

        let runs = bleeding_runs(&days);

        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].days, 2);
        assert!(!runs[0].followed_by_clean_day);
        assert_eq!(runs[1].days, 1);
        assert!(!runs[1].followed_by_clean_day);
        assert_eq!(runs[2].days, 2);
        assert!(runs[2].followed_by_clean_day);
    }

    #[test]
    fn test_rest_window_end_of_day() {
        let window = RestWindow::starting(date(2025, 6, 8));

        assert_eq!(window.last_day, date(2025, 6, 12));
        assert_eq!(window.ends_at(), at(date(2025, 6, 12), 23, 59, 59));
        assert_eq!(window.days_left(window.ends_at()), None);
        assert_eq!(
            window.days_left(window.ends_at() - Duration::seconds(1)),
            Some(1)
        );
    }

    #[test]
    fn test_future_logs_are_ignored_for_streak() {
        let today = date(2025, 6, 10);
        let logs = history(today, &[(-1, false), (0, false), (1, false)]);

        let status = compute_status(&logs, at(today, 12, 0, 0));

        assert_eq!(status.current_streak, 2);
    }

    /// Exhaustively check invariants over every 8-day logging pattern
    #[test]
    fn test_status_invariants_over_all_short_histories() {
        let today = date(2025, 6, 10);
        let now = at(today, 12, 0, 0);

        for logged in 0u32..256 {
            for bleeding in 0u32..256 {
                let days: Vec<(i64, bool)> = (0..8)
                    .filter(|i| logged & (1 << i) != 0)
                    .map(|i| (i64::from(i), bleeding & (1 << i) != 0))
                    .collect();
                let logs = history(today, &days);

                let status = compute_status(&logs, now);

                let active_window = bleeding_runs(&collapse_by_day(&logs))
                    .iter()
                    .filter(|run| run.triggers_rest())
                    .any(|run| run.rest_window().days_left(now).is_some());
                assert_eq!(
                    status.is_rest_period, active_window,
                    "pattern {logged:08b}/{bleeding:08b}"
                );

                if status.is_rest_period {
                    assert_eq!(status.current_streak, 0, "pattern {logged:08b}/{bleeding:08b}");
                    assert!(status.rest_days_left > 0);
                } else {
                    assert_eq!(status.rest_days_left, 0);
                }

                let latest_clean = collapse_by_day(&logs)
                    .first()
                    .map_or(true, |d| !d.has_bleeding);
                if latest_clean {
                    assert_eq!(status.consecutive_bleeding_days, 0);
                }

                assert_eq!(status, compute_status(&logs, now));
            }
        }
    }
}
