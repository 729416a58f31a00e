//! Read-only rollups derived from the time log.
//!
//! Log entries are the sole source of truth; nothing here mutates state or
//! touches the store.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, NaiveDate};

use crate::models::{ActivityMode, TimeLogEntry};

/// Focus seconds per calendar day (UTC).
pub fn daily_totals(logs: &[TimeLogEntry]) -> BTreeMap<NaiveDate, u64> {
    let mut totals = BTreeMap::new();
    for entry in logs {
        *totals.entry(entry.started_at.date_naive()).or_insert(0) += entry.duration_secs;
    }
    totals
}

pub fn total_focus_secs(logs: &[TimeLogEntry]) -> u64 {
    logs.iter().map(|entry| entry.duration_secs).sum()
}

pub fn completed_sessions(logs: &[TimeLogEntry]) -> usize {
    logs.iter().filter(|entry| entry.completed).count()
}

/// Consecutive days with at least one log entry, counting back from today.
/// A streak survives a not-yet-logged today: if today is empty the count
/// starts from yesterday.
pub fn current_streak_days(logs: &[TimeLogEntry], today: NaiveDate) -> u32 {
    let days: HashSet<NaiveDate> = logs.iter().map(|entry| entry.started_at.date_naive()).collect();

    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor = cursor - Duration::days(1);
    }
    streak
}

pub fn per_mode_totals(logs: &[TimeLogEntry]) -> HashMap<ActivityMode, u64> {
    let mut totals = HashMap::new();
    for entry in logs {
        *totals.entry(entry.mode).or_insert(0) += entry.duration_secs;
    }
    totals
}

/// Focus seconds per project id. Entries without a project are excluded.
pub fn per_project_totals(logs: &[TimeLogEntry]) -> HashMap<String, u64> {
    let mut totals = HashMap::new();
    for entry in logs {
        if let Some(project_id) = &entry.project_id {
            *totals.entry(project_id.clone()).or_insert(0) += entry.duration_secs;
        }
    }
    totals
}

/// Entry count per calendar day, for heatmap rendering.
pub fn heatmap_counts(logs: &[TimeLogEntry]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for entry in logs {
        *counts.entry(entry.started_at.date_naive()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn entry(day: &str, secs: u64, mode: ActivityMode, project: Option<&str>) -> TimeLogEntry {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
        let started_at = Utc.from_utc_datetime(&date.and_hms_opt(10, 0, 0).unwrap());
        TimeLogEntry {
            id: format!("{day}-{secs}"),
            started_at,
            ended_at: started_at + Duration::seconds(secs as i64),
            duration_secs: secs,
            planned_secs: 1500,
            mode,
            project_id: project.map(str::to_string),
            task_id: None,
            task_name: None,
            completed: secs >= 1500,
        }
    }

    #[test]
    fn daily_totals_group_by_start_date() {
        let logs = vec![
            entry("2026-08-06", 600, ActivityMode::Working, None),
            entry("2026-08-06", 300, ActivityMode::Reading, None),
            entry("2026-08-07", 1500, ActivityMode::Coding, None),
        ];
        let totals = daily_totals(&logs);
        assert_eq!(totals[&NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()], 900);
        assert_eq!(totals[&NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()], 1500);
        assert_eq!(total_focus_secs(&logs), 2400);
        assert_eq!(completed_sessions(&logs), 1);
    }

    #[test]
    fn streak_counts_back_from_today_or_yesterday() {
        let logs = vec![
            entry("2026-08-05", 600, ActivityMode::Working, None),
            entry("2026-08-06", 600, ActivityMode::Working, None),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        // Today has no entry yet; the two-day run still counts.
        assert_eq!(current_streak_days(&logs, today), 2);

        let with_today = {
            let mut logs = logs.clone();
            logs.push(entry("2026-08-07", 600, ActivityMode::Working, None));
            logs
        };
        assert_eq!(current_streak_days(&with_today, today), 3);

        // A gap ends the streak.
        let gapped = vec![entry("2026-08-04", 600, ActivityMode::Working, None)];
        assert_eq!(current_streak_days(&gapped, today), 0);
    }

    #[test]
    fn rollups_by_mode_and_project() {
        let logs = vec![
            entry("2026-08-07", 600, ActivityMode::Working, Some("p1")),
            entry("2026-08-07", 300, ActivityMode::Working, Some("p2")),
            entry("2026-08-07", 200, ActivityMode::Reading, None),
        ];
        let by_mode = per_mode_totals(&logs);
        assert_eq!(by_mode[&ActivityMode::Working], 900);
        assert_eq!(by_mode[&ActivityMode::Reading], 200);

        let by_project = per_project_totals(&logs);
        assert_eq!(by_project["p1"], 600);
        assert_eq!(by_project["p2"], 300);
        assert_eq!(by_project.len(), 2, "unassigned entries are excluded");

        assert_eq!(
            heatmap_counts(&logs)[&NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()],
            3
        );
    }
}
