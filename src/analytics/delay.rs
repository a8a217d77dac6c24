//! Delay forecasting: a logistic transform over the shared feature family
//! plus budget scale, producing a probability, a day estimate, ranked
//! drivers and recommendations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::drivers::{rank_drivers, Driver};
use crate::analytics::features::{
    budget_scale, count_tasks, recent_safety_incidents, schedule_gap, weather_risk,
    DELAY_RECENT_WINDOW,
};
use crate::analytics::{Confidence, RiskLevel};
use crate::domain::{DailyLog, Project, ProjectSummary, Task};

const INTERCEPT: f64 = -1.4;
const GAP_WEIGHT: f64 = 0.09;
const BLOCKED_WEIGHT: f64 = 0.45;
const DELAYED_WEIGHT: f64 = 0.30;
const HIGH_PRIORITY_WEIGHT: f64 = 0.22;
const SAFETY_WEIGHT: f64 = 0.18;
const WEATHER_WEIGHT: f64 = 0.16;
const BUDGET_WEIGHT: f64 = 0.15;

/// Clamp bounds on the probability; both values are part of the output
/// contract and keep the sigmoid away from degenerate 0/1.
const PROBABILITY_FLOOR: f64 = 0.02;
const PROBABILITY_CEILING: f64 = 0.98;

const DAYS_PER_PROBABILITY: f64 = 30.0;
const DAYS_PER_GAP_POINT: f64 = 0.6;
const DAYS_PER_BLOCKED_TASK: f64 = 1.5;
const DAYS_PER_DELAYED_TASK: f64 = 1.2;

/// Probability cutoffs for the delay band, highest first. Independent of
/// the risk scorer's level thresholds.
const BAND_CUTOFFS: [(f64, RiskLevel); 2] = [(0.70, RiskLevel::High), (0.40, RiskLevel::Medium)];

/// Log-count cutoffs for the confidence label.
const CONFIDENCE_CUTOFFS: [(usize, Confidence); 2] = [(5, Confidence::High), (2, Confidence::Medium)];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelayFeatures {
    pub open_tasks: u32,
    pub blocked_tasks: u32,
    pub delayed_tasks: u32,
    pub high_priority_open: u32,
    pub schedule_gap: i64,
    pub safety_incidents: u32,
    pub weather_risk: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelayPrediction {
    pub predicted_delay_days: i64,
    pub delay_probability: f64,
    pub risk_band: RiskLevel,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelayForecast {
    pub project: ProjectSummary,
    pub features: DelayFeatures,
    pub prediction: DelayPrediction,
    pub drivers: Vec<Driver>,
    pub recommendations: Vec<String>,
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn band_for(probability: f64) -> RiskLevel {
    BAND_CUTOFFS
        .iter()
        .find(|(cutoff, _)| probability >= *cutoff)
        .map_or(RiskLevel::Low, |(_, band)| *band)
}

fn confidence_for(log_count: usize) -> Confidence {
    CONFIDENCE_CUTOFFS
        .iter()
        .find(|(cutoff, _)| log_count >= *cutoff)
        .map_or(Confidence::Low, |(_, confidence)| *confidence)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Forecasts delay for a project from its task snapshot and daily logs
/// (newest-first). Confidence reflects how many logs were supplied;
/// the safety and weather windows self-limit to the five most recent.
pub fn build_delay_forecast(
    project: &Project,
    tasks: &[Task],
    logs: &[DailyLog],
    now: DateTime<Utc>,
) -> DelayForecast {
    let counts = count_tasks(tasks, now);
    let gap = schedule_gap(logs);
    let safety = recent_safety_incidents(logs, DELAY_RECENT_WINDOW);
    let weather = weather_risk(logs, DELAY_RECENT_WINDOW);
    let scale = budget_scale(project.budget);

    let raw = INTERCEPT
        + gap as f64 * GAP_WEIGHT
        + f64::from(counts.blocked) * BLOCKED_WEIGHT
        + f64::from(counts.delayed) * DELAYED_WEIGHT
        + f64::from(counts.high_priority_open) * HIGH_PRIORITY_WEIGHT
        + f64::from(safety) * SAFETY_WEIGHT
        + f64::from(weather) * WEATHER_WEIGHT
        + scale * BUDGET_WEIGHT;

    let probability = sigmoid(raw).clamp(PROBABILITY_FLOOR, PROBABILITY_CEILING);
    let predicted_days = (probability * DAYS_PER_PROBABILITY
        + gap as f64 * DAYS_PER_GAP_POINT
        + f64::from(counts.blocked) * DAYS_PER_BLOCKED_TASK
        + f64::from(counts.delayed) * DAYS_PER_DELAYED_TASK)
        .round()
        .max(0.0) as i64;

    let drivers = rank_drivers(vec![
        Driver::new("Schedule variance", gap as f64, GAP_WEIGHT),
        Driver::new("Blocked tasks", f64::from(counts.blocked), BLOCKED_WEIGHT),
        Driver::new("Delayed tasks", f64::from(counts.delayed), DELAYED_WEIGHT),
        Driver::new(
            "High-priority open tasks",
            f64::from(counts.high_priority_open),
            HIGH_PRIORITY_WEIGHT,
        ),
        Driver::new("Recent safety incidents", f64::from(safety), SAFETY_WEIGHT),
        Driver::new("Recent weather disruption", f64::from(weather), WEATHER_WEIGHT),
    ]);

    let mut recommendations = Vec::new();
    if gap > 0 {
        recommendations
            .push("Run rolling 2-week lookahead with daily variance closure.".to_string());
    }
    if counts.blocked > 0 {
        recommendations
            .push("Escalate and clear blocked dependencies within 24 hours.".to_string());
    }
    if counts.delayed > 0 {
        recommendations
            .push("Prioritize delayed tasks to avoid critical path spillover.".to_string());
    }
    if safety > 0 {
        recommendations
            .push("Execute targeted EHS intervention before next high-risk activity.".to_string());
    }
    if recommendations.is_empty() {
        recommendations
            .push("Maintain current execution rhythm and monitor lag indicators daily.".to_string());
    }

    DelayForecast {
        project: ProjectSummary::of(project),
        features: DelayFeatures {
            open_tasks: counts.open,
            blocked_tasks: counts.blocked,
            delayed_tasks: counts.delayed,
            high_priority_open: counts.high_priority_open,
            schedule_gap: gap,
            safety_incidents: safety,
            weather_risk: weather,
        },
        prediction: DelayPrediction {
            predicted_delay_days: predicted_days,
            delay_probability: round3(probability),
            risk_band: band_for(probability),
            confidence: confidence_for(logs.len()),
        },
        drivers,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectStatus, TaskPriority, TaskStatus, Weather};

    fn fixed_now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn project(budget: f64) -> Project {
        Project {
            id: "p1".into(),
            name: "Tower A".into(),
            client: "Infranova".into(),
            location: "Hyderabad".into(),
            start_date: fixed_now(),
            end_date: fixed_now(),
            budget,
            status: ProjectStatus::Active,
            progress: 42,
            created_by: "u1".into(),
            created_at: fixed_now(),
        }
    }

    fn task(status: TaskStatus, priority: TaskPriority, due_days: Option<i64>) -> Task {
        crate::analytics::features::tests::task(status, priority, due_days)
    }

    fn log(planned: u8, actual: u8, weather: Weather, incidents: u32) -> DailyLog {
        crate::analytics::features::tests::log(planned, actual, weather, incidents)
    }

    #[test]
    fn empty_inputs_give_baseline_forecast() {
        let forecast = build_delay_forecast(&project(0.0), &[], &[], fixed_now());
        // raw = -1.4, sigmoid ≈ 0.1978; clamp floor does not bite.
        let p = sigmoid(-1.4);
        assert_eq!(forecast.prediction.delay_probability, round3(p));
        assert_eq!(forecast.prediction.predicted_delay_days, (p * 30.0).round() as i64);
        assert_eq!(forecast.prediction.risk_band, RiskLevel::Low);
        assert_eq!(forecast.prediction.confidence, Confidence::Low);
        assert!(forecast.drivers.is_empty());
        assert_eq!(
            forecast.recommendations,
            vec!["Maintain current execution rhythm and monitor lag indicators daily.".to_string()]
        );
    }

    #[test]
    fn probability_never_exceeds_ceiling() {
        let mut tasks = Vec::new();
        for _ in 0..30 {
            tasks.push(task(TaskStatus::Blocked, TaskPriority::High, Some(-1)));
        }
        let logs = vec![log(99, 0, Weather::Storm, 9)];
        let forecast = build_delay_forecast(&project(1e12), &tasks, &logs, fixed_now());
        assert_eq!(forecast.prediction.delay_probability, PROBABILITY_CEILING);
        assert_eq!(forecast.prediction.risk_band, RiskLevel::High);
        assert!(forecast.prediction.predicted_delay_days >= 0);
    }

    #[test]
    fn confidence_tracks_log_volume() {
        assert_eq!(confidence_for(0), Confidence::Low);
        assert_eq!(confidence_for(1), Confidence::Low);
        assert_eq!(confidence_for(2), Confidence::Medium);
        assert_eq!(confidence_for(4), Confidence::Medium);
        assert_eq!(confidence_for(5), Confidence::High);
        assert_eq!(confidence_for(20), Confidence::High);
    }

    #[test]
    fn band_cutoffs_are_independent_of_risk_levels() {
        assert_eq!(band_for(0.39), RiskLevel::Low);
        assert_eq!(band_for(0.40), RiskLevel::Medium);
        assert_eq!(band_for(0.69), RiskLevel::Medium);
        assert_eq!(band_for(0.70), RiskLevel::High);
    }

    #[test]
    fn weather_score_flows_to_features_and_drivers() {
        // Storm in 2 of the 5 most recent logs: weatherRisk = 4.
        let logs = vec![
            log(10, 10, Weather::Storm, 0),
            log(10, 10, Weather::Clear, 0),
            log(10, 10, Weather::Storm, 0),
            log(10, 10, Weather::Clear, 0),
            log(10, 10, Weather::Clear, 0),
        ];
        let forecast = build_delay_forecast(&project(0.0), &[], &logs, fixed_now());
        assert_eq!(forecast.features.weather_risk, 4);
        let weather_driver = forecast
            .drivers
            .iter()
            .find(|d| d.factor == "Recent weather disruption")
            .expect("weather driver present");
        assert_eq!(weather_driver.value, 4.0);
        assert!((weather_driver.impact - 4.0 * WEATHER_WEIGHT).abs() < 1e-9);
        assert_eq!(forecast.prediction.confidence, Confidence::High);
    }

    #[test]
    fn drivers_exclude_zero_valued_signals_and_rank_by_impact() {
        let tasks = vec![
            task(TaskStatus::Blocked, TaskPriority::Low, None),
            task(TaskStatus::Blocked, TaskPriority::Low, None),
            task(TaskStatus::Todo, TaskPriority::Low, Some(-1)),
        ];
        let logs = vec![log(50, 45, Weather::Clear, 0)];
        let forecast = build_delay_forecast(&project(0.0), &tasks, &logs, fixed_now());
        // gap 5 * 0.09 = 0.45; blocked 2 * 0.45 = 0.90; delayed 1 * 0.30.
        let factors: Vec<&str> = forecast.drivers.iter().map(|d| d.factor.as_str()).collect();
        assert_eq!(
            factors,
            ["Blocked tasks", "Schedule variance", "Delayed tasks"]
        );
        assert!(forecast.drivers.iter().all(|d| d.value > 0.0));
    }

    #[test]
    fn day_estimate_uses_unrounded_probability() {
        let tasks = vec![task(TaskStatus::Blocked, TaskPriority::Low, None)];
        let logs = vec![log(60, 50, Weather::Clear, 0), log(55, 50, Weather::Clear, 0)];
        let forecast = build_delay_forecast(&project(50_000_000.0), &tasks, &logs, fixed_now());

        let raw = INTERCEPT + 10.0 * GAP_WEIGHT + 1.0 * BLOCKED_WEIGHT + 0.5 * BUDGET_WEIGHT;
        let p = sigmoid(raw);
        let expected_days = (p * 30.0 + 10.0 * 0.6 + 1.0 * 1.5).round() as i64;
        assert_eq!(forecast.prediction.predicted_delay_days, expected_days);
        assert_eq!(forecast.prediction.delay_probability, round3(p));
        assert_eq!(forecast.prediction.confidence, Confidence::Medium);
    }

    #[test]
    fn identical_inputs_yield_identical_forecast() {
        let tasks = vec![task(TaskStatus::Blocked, TaskPriority::High, Some(-2))];
        let logs = vec![log(70, 52, Weather::Rain, 1)];
        let now = fixed_now();
        let first = build_delay_forecast(&project(2e8), &tasks, &logs, now);
        let second = build_delay_forecast(&project(2e8), &tasks, &logs, now);
        assert_eq!(first, second);
    }

    #[test]
    fn output_json_uses_camel_case_surface() {
        let forecast = build_delay_forecast(&project(0.0), &[], &[], fixed_now());
        let json = serde_json::to_value(&forecast).unwrap();
        assert!(json["features"]["highPriorityOpen"].is_number());
        assert!(json["features"]["weatherRisk"].is_number());
        assert!(json["prediction"]["predictedDelayDays"].is_number());
        assert!(json["prediction"]["delayProbability"].is_number());
        assert_eq!(json["prediction"]["confidence"], "low");
    }
}
