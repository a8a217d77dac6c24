use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::analytics::{DelayForecast, RiskInsights, RiskLevel};

fn level_cell(level: RiskLevel) -> Cell {
    let label = match level {
        RiskLevel::Low => "LOW",
        RiskLevel::Medium => "MEDIUM",
        RiskLevel::High => "HIGH",
    };
    let color = match level {
        RiskLevel::Low => Color::Green,
        RiskLevel::Medium => Color::Yellow,
        RiskLevel::High => Color::Red,
    };
    Cell::new(label).fg(color)
}

pub fn render_risk_table(insights: &RiskInsights) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Project",
        "Score",
        "Level",
        "Gap",
        "Blocked",
        "Delayed",
        "Open",
        "Safety",
    ]);
    table.add_row(Row::from(vec![
        Cell::new(&insights.project.name),
        Cell::new(insights.risk_score.to_string()),
        level_cell(insights.risk_level),
        Cell::new(insights.metrics.schedule_gap.to_string()),
        Cell::new(insights.metrics.blocked_tasks.to_string()),
        Cell::new(insights.metrics.delayed_tasks.to_string()),
        Cell::new(insights.metrics.open_tasks.to_string()),
        Cell::new(insights.metrics.safety_incidents.to_string()),
    ]));

    let mut out = table.to_string();
    out.push_str("\nRecommendations:\n");
    for recommendation in &insights.recommendations {
        out.push_str(&format!("  - {recommendation}\n"));
    }
    out
}

pub fn render_forecast_table(forecast: &DelayForecast) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Project",
        "Delay (days)",
        "Probability",
        "Band",
        "Confidence",
    ]);
    table.add_row(Row::from(vec![
        Cell::new(&forecast.project.name),
        Cell::new(forecast.prediction.predicted_delay_days.to_string()),
        Cell::new(format!("{:.3}", forecast.prediction.delay_probability)),
        level_cell(forecast.prediction.risk_band),
        Cell::new(format!("{:?}", forecast.prediction.confidence).to_uppercase()),
    ]));

    let mut drivers = Table::new();
    drivers
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    drivers.set_header(vec!["Driver", "Value", "Impact"]);
    for driver in &forecast.drivers {
        drivers.add_row(vec![
            driver.factor.clone(),
            format!("{:.0}", driver.value),
            format!("{:.3}", driver.impact),
        ]);
    }

    let mut out = table.to_string();
    out.push('\n');
    out.push_str(&drivers.to_string());
    out.push_str("\nRecommendations:\n");
    for recommendation in &forecast.recommendations {
        out.push_str(&format!("  - {recommendation}\n"));
    }
    out
}
