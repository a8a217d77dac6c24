//! Current-risk scoring: an additive point score over task and log
//! features, with each signal independently capped and the total capped
//! at 100.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::features::{
    count_tasks, recent_safety_incidents, schedule_gap, schedule_gap_trend, RISK_SAFETY_WINDOW,
};
use crate::analytics::RiskLevel;
use crate::domain::{DailyLog, Project, ProjectSummary, Task};

/// Gap thresholds and their points, highest band first. Only the first
/// matching band applies.
const GAP_POINT_BANDS: [(i64, u32); 3] = [(15, 35), (8, 20), (5, 10)];

const BLOCKED_POINTS: u32 = 8;
const BLOCKED_CAP: u32 = 24;
const HIGH_PRIORITY_POINTS: u32 = 5;
const HIGH_PRIORITY_CAP: u32 = 20;
const DELAYED_POINTS: u32 = 5;
const DELAYED_CAP: u32 = 15;
const SAFETY_POINTS: u32 = 6;
const SAFETY_CAP: u32 = 18;

const WORSENING_TREND_THRESHOLD: i64 = 3;
const WORSENING_TREND_POINTS: u32 = 8;

const MAX_SCORE: u32 = 100;
const ESCALATION_THRESHOLD: u32 = 70;

/// Score cutoffs for the risk level, highest band first.
const LEVEL_BANDS: [(u32, RiskLevel); 2] = [(60, RiskLevel::High), (30, RiskLevel::Medium)];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub open_tasks: u32,
    pub blocked_tasks: u32,
    pub delayed_tasks: u32,
    pub schedule_gap: i64,
    pub safety_incidents: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskInsights {
    pub project: ProjectSummary,
    pub metrics: RiskMetrics,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

fn gap_points(gap: i64) -> u32 {
    GAP_POINT_BANDS
        .iter()
        .find(|(threshold, _)| gap >= *threshold)
        .map_or(0, |(_, points)| *points)
}

fn level_for(score: u32) -> RiskLevel {
    LEVEL_BANDS
        .iter()
        .find(|(threshold, _)| score >= *threshold)
        .map_or(RiskLevel::Low, |(_, level)| *level)
}

/// Scores a project's current execution risk from its task snapshot and
/// its daily logs (newest-first; only the first three logs feed the
/// safety window and the first two feed the trend).
pub fn build_risk_insights(
    project: &Project,
    tasks: &[Task],
    logs: &[DailyLog],
    now: DateTime<Utc>,
) -> RiskInsights {
    let counts = count_tasks(tasks, now);
    let gap = schedule_gap(logs);
    let trend = schedule_gap_trend(logs);
    let safety = recent_safety_incidents(logs, RISK_SAFETY_WINDOW);

    let mut score = gap_points(gap);
    score += (counts.blocked * BLOCKED_POINTS).min(BLOCKED_CAP);
    score += (counts.high_priority_open * HIGH_PRIORITY_POINTS).min(HIGH_PRIORITY_CAP);
    score += (counts.delayed * DELAYED_POINTS).min(DELAYED_CAP);
    score += (safety * SAFETY_POINTS).min(SAFETY_CAP);
    if trend >= WORSENING_TREND_THRESHOLD {
        score += WORSENING_TREND_POINTS;
    }
    let score = score.min(MAX_SCORE);

    let mut recommendations = Vec::new();
    if gap >= 8 {
        recommendations.push(
            "Immediate recovery plan required with milestone-by-milestone tracking.".to_string(),
        );
    } else if gap > 0 {
        recommendations
            .push("Track schedule variance daily and run focused catch-up planning.".to_string());
    }
    if trend >= WORSENING_TREND_THRESHOLD {
        recommendations.push(
            "Schedule gap is worsening. Activate night shift or parallel work fronts.".to_string(),
        );
    }
    if counts.blocked > 0 {
        recommendations
            .push("Escalate blocked tasks to project manager and assign owners.".to_string());
    }
    if counts.delayed > 0 {
        recommendations
            .push("Resolve delayed tasks first to avoid cascading timeline impact.".to_string());
    }
    if counts.high_priority_open > 2 {
        recommendations
            .push("Prioritize high-impact execution tasks for next 48 hours.".to_string());
    }
    if safety >= 2 {
        recommendations.push(
            "Immediate EHS intervention required before continuing high-risk activities."
                .to_string(),
        );
    } else if safety > 0 {
        recommendations
            .push("Conduct toolbox talk and enforce daily safety checklist.".to_string());
    }
    if score >= ESCALATION_THRESHOLD {
        recommendations
            .push("Run executive war-room review until risk drops below medium.".to_string());
    }
    if recommendations.is_empty() {
        recommendations
            .push("Project is stable. Continue daily monitoring and variance checks.".to_string());
    }

    RiskInsights {
        project: ProjectSummary::of(project),
        metrics: RiskMetrics {
            open_tasks: counts.open,
            blocked_tasks: counts.blocked,
            delayed_tasks: counts.delayed,
            schedule_gap: gap,
            safety_incidents: safety,
        },
        risk_score: score,
        risk_level: level_for(score),
        recommendations,
    }
}
