use serde::{Deserialize, Serialize};

/// A named signal with its raw magnitude and weighted contribution to a
/// score. Produced fresh per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub factor: String,
    pub value: f64,
    pub impact: f64,
}

impl Driver {
    pub fn new(factor: &str, value: f64, weight: f64) -> Self {
        Self {
            factor: factor.to_string(),
            value,
            impact: value * weight,
        }
    }
}

/// Drops zero-value factors and orders the rest by descending impact.
/// The sort is stable, so declaration order breaks ties.
pub fn rank_drivers(candidates: Vec<Driver>) -> Vec<Driver> {
    let mut ranked: Vec<Driver> = candidates
        .into_iter()
        .filter(|driver| driver.value > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    ranked
}
