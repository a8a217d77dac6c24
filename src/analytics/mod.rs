pub mod delay;
pub mod drivers;
pub mod features;
pub mod risk;

use serde::{Deserialize, Serialize};

pub use delay::{build_delay_forecast, DelayFeatures, DelayForecast, DelayPrediction};
pub use drivers::{rank_drivers, Driver};
pub use features::{
    budget_scale, count_tasks, recent_safety_incidents, schedule_gap, schedule_gap_trend,
    weather_risk, TaskCounts, DELAY_RECENT_WINDOW, RISK_SAFETY_WINDOW,
};
pub use risk::{build_risk_insights, RiskInsights, RiskMetrics};

/// Three-band classification shared by the risk score and the delay
/// probability. The two scorers cut their bands at different thresholds;
/// only the labels are shared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How much log history backed a prediction. Reflects evidence volume,
/// not statistical certainty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}
