//! Feature extraction over task and daily-log snapshots.
//!
//! Every function here is a pure read over its inputs. Log slices must be
//! ordered newest-first (the store returns them descending by date); the
//! first element is "latest" and the second is "previous".

use chrono::{DateTime, Utc};

use crate::domain::{DailyLog, Task, TaskPriority, TaskStatus};

/// Safety-incident window used by the risk scorer.
pub const RISK_SAFETY_WINDOW: usize = 3;
/// Safety-incident and weather window used by the delay predictor.
pub const DELAY_RECENT_WINDOW: usize = 5;

const BUDGET_SCALE_DIVISOR: f64 = 100_000_000.0;
const BUDGET_SCALE_MAX: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub open: u32,
    pub blocked: u32,
    pub delayed: u32,
    pub high_priority_open: u32,
}

/// Classifies a task snapshot into the four counts both scorers consume.
/// `now` is injected so delayed-task detection stays reproducible in tests.
pub fn count_tasks(tasks: &[Task], now: DateTime<Utc>) -> TaskCounts {
    let mut counts = TaskCounts::default();
    for task in tasks {
        if task.status.is_done() {
            continue;
        }
        counts.open += 1;
        if task.status == TaskStatus::Blocked {
            counts.blocked += 1;
        }
        if task.priority == TaskPriority::High {
            counts.high_priority_open += 1;
        }
        if task.due_date.is_some_and(|due| due < now) {
            counts.delayed += 1;
        }
    }
    counts
}

fn gap_of(log: &DailyLog) -> i64 {
    (i64::from(log.planned_progress) - i64::from(log.actual_progress)).max(0)
}

/// Planned-minus-actual progress of the newest log, floored at 0.
pub fn schedule_gap(logs: &[DailyLog]) -> i64 {
    logs.first().map_or(0, gap_of)
}

/// Current gap minus the previous log's gap. Positive means the gap is
/// worsening. With a single log the previous gap is 0, so the trend equals
/// the current gap.
pub fn schedule_gap_trend(logs: &[DailyLog]) -> i64 {
    schedule_gap(logs) - logs.get(1).map_or(0, gap_of)
}

/// Sum of safety incidents over the most recent `window` logs.
pub fn recent_safety_incidents(logs: &[DailyLog], window: usize) -> u32 {
    logs.iter()
        .take(window)
        .map(|log| log.safety_incidents)
        .sum()
}

/// Weighted weather-disruption score over the most recent `window` logs.
pub fn weather_risk(logs: &[DailyLog], window: usize) -> u32 {
    logs.iter()
        .take(window)
        .map(|log| log.weather.disruption_weight())
        .sum()
}

/// Normalizes the project budget into a bounded multiplier in [0, 3].
pub fn budget_scale(budget: f64) -> f64 {
    (budget / BUDGET_SCALE_DIVISOR).clamp(0.0, BUDGET_SCALE_MAX)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{TaskCategory, Weather};
    use chrono::Duration;

    pub(crate) fn fixed_now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    pub(crate) fn task(status: TaskStatus, priority: TaskPriority, due_days: Option<i64>) -> Task {
        let now = fixed_now();
        Task {
            id: "t".into(),
            project_id: "p".into(),
            title: "task".into(),
            description: None,
            category: TaskCategory::Execution,
            priority,
            status,
            assignee: None,
            due_date: due_days.map(|d| now + Duration::days(d)),
            completed_at: None,
            created_at: now,
        }
    }

    pub(crate) fn log(planned: u8, actual: u8, weather: Weather, incidents: u32) -> DailyLog {
        DailyLog {
            id: "l".into(),
            project_id: "p".into(),
            date: fixed_now(),
            planned_progress: planned,
            actual_progress: actual,
            manpower: 20,
            weather,
            safety_incidents: incidents,
            blockers: Vec::new(),
            notes: None,
            created_at: fixed_now(),
        }
    }

    #[test]
    fn empty_task_list_yields_zero_counts() {
        assert_eq!(count_tasks(&[], fixed_now()), TaskCounts::default());
    }

    #[test]
    fn counts_classify_open_blocked_delayed_and_high_priority() {
        let tasks = vec![
            task(TaskStatus::Done, TaskPriority::High, Some(-5)),
            task(TaskStatus::Blocked, TaskPriority::High, Some(-1)),
            task(TaskStatus::InProgress, TaskPriority::Low, Some(2)),
            task(TaskStatus::Todo, TaskPriority::Medium, None),
        ];
        let counts = count_tasks(&tasks, fixed_now());
        assert_eq!(counts.open, 3);
        assert_eq!(counts.blocked, 1);
        // Done tasks are never delayed, even with a past due date.
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.high_priority_open, 1);
    }

    #[test]
    fn due_date_must_be_strictly_past() {
        let at_now = task(TaskStatus::Todo, TaskPriority::Low, Some(0));
        let counts = count_tasks(&[at_now], fixed_now());
        assert_eq!(counts.delayed, 0);
    }

    #[test]
    fn schedule_gap_uses_newest_log_and_floors_at_zero() {
        let logs = vec![
            log(40, 55, Weather::Clear, 0),
            log(90, 10, Weather::Clear, 0),
        ];
        assert_eq!(schedule_gap(&logs), 0);
        assert_eq!(schedule_gap(&[]), 0);
    }

    #[test]
    fn trend_with_single_log_equals_current_gap() {
        let logs = vec![log(60, 48, Weather::Clear, 0)];
        assert_eq!(schedule_gap_trend(&logs), 12);
    }

    #[test]
    fn trend_is_current_minus_previous_gap() {
        let logs = vec![log(60, 48, Weather::Clear, 0), log(55, 50, Weather::Clear, 0)];
        assert_eq!(schedule_gap_trend(&logs), 12 - 5);
    }

    #[test]
    fn safety_window_self_limits() {
        let logs = vec![
            log(10, 10, Weather::Clear, 1),
            log(10, 10, Weather::Clear, 2),
            log(10, 10, Weather::Clear, 3),
            log(10, 10, Weather::Clear, 10),
        ];
        assert_eq!(recent_safety_incidents(&logs, RISK_SAFETY_WINDOW), 6);
        assert_eq!(recent_safety_incidents(&logs, DELAY_RECENT_WINDOW), 16);
        assert_eq!(recent_safety_incidents(&logs[..1], RISK_SAFETY_WINDOW), 1);
    }

    #[test]
    fn weather_risk_weights_storm_double() {
        let logs = vec![
            log(10, 10, Weather::Storm, 0),
            log(10, 10, Weather::Rain, 0),
            log(10, 10, Weather::Heatwave, 0),
            log(10, 10, Weather::Clear, 0),
            log(10, 10, Weather::Unknown, 0),
            log(10, 10, Weather::Storm, 0),
        ];
        // Sixth log falls outside the 5-log window.
        assert_eq!(weather_risk(&logs, DELAY_RECENT_WINDOW), 4);
    }

    #[test]
    fn budget_scale_is_clamped() {
        assert_eq!(budget_scale(0.0), 0.0);
        assert_eq!(budget_scale(-5.0), 0.0);
        assert!((budget_scale(185_000_000.0) - 1.85).abs() < 1e-9);
        assert_eq!(budget_scale(1_000_000_000.0), 3.0);
    }
}
