use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! closed_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $slug:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_slug(&self) -> &'static str {
                match self {
                    $(Self::$variant => $slug),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_slug())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($slug => Ok(Self::$variant),)+
                    _ => Err(EnumParseError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

closed_enum!(ProjectStatus, "project status", {
    Planning => "planning",
    Active => "active",
    Delayed => "delayed",
    Completed => "completed",
});

closed_enum!(TaskStatus, "task status", {
    Todo => "todo",
    InProgress => "in_progress",
    Blocked => "blocked",
    Done => "done",
});

closed_enum!(TaskPriority, "task priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

closed_enum!(TaskCategory, "task category", {
    Procurement => "procurement",
    Execution => "execution",
    QaQc => "qa_qc",
    Safety => "safety",
    Billing => "billing",
});

closed_enum!(Weather, "weather", {
    Clear => "clear",
    Rain => "rain",
    Storm => "storm",
    Heatwave => "heatwave",
    Unknown => "unknown",
});

closed_enum!(Role, "role", {
    ProjectManager => "project_manager",
    SiteEngineer => "site_engineer",
    Vendor => "vendor",
    Viewer => "viewer",
});

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl Weather {
    /// Disruption weight used by the delay predictor's weather signal.
    pub fn disruption_weight(&self) -> u32 {
        match self {
            Self::Storm => 2,
            Self::Rain | Self::Heatwave => 1,
            Self::Clear | Self::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub budget: f64,
    pub status: ProjectStatus,
    pub progress: u8,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One site diary entry. Progress figures are whole percentages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    pub id: String,
    pub project_id: String,
    pub date: DateTime<Utc>,
    pub planned_progress: u8,
    pub actual_progress: u8,
    pub manpower: u32,
    pub weather: Weather,
    pub safety_incidents: u32,
    pub blockers: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Project header echoed back by both analytics endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub progress: u8,
}

impl ProjectSummary {
    pub fn of(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            status: project.status,
            progress: project.progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enum_slugs() {
        assert_eq!(
            "in_progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!("qa_qc".parse::<TaskCategory>().unwrap(), TaskCategory::QaQc);
        assert_eq!(
            "project_manager".parse::<Role>().unwrap(),
            Role::ProjectManager
        );
        assert!("tornado".parse::<Weather>().is_err());
    }

    #[test]
    fn enums_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::Planning).unwrap(),
            "\"planning\""
        );
        assert_eq!(
            serde_json::to_string(&Weather::Heatwave).unwrap(),
            "\"heatwave\""
        );
    }

    #[test]
    fn weather_disruption_weights() {
        assert_eq!(Weather::Storm.disruption_weight(), 2);
        assert_eq!(Weather::Rain.disruption_weight(), 1);
        assert_eq!(Weather::Heatwave.disruption_weight(), 1);
        assert_eq!(Weather::Clear.disruption_weight(), 0);
        assert_eq!(Weather::Unknown.disruption_weight(), 0);
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: "u1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password_hash: "secret".into(),
            role: Role::Viewer,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("password"));
    }
}
