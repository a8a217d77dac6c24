//! Demo data for local exploration: one project manager, one active
//! project, a task board and a short run of daily logs so the analytics
//! endpoints return non-trivial output out of the box.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::domain::{
    DailyLog, Project, ProjectStatus, Role, Task, TaskCategory, TaskPriority, TaskStatus, User,
    Weather,
};
use crate::store::ProjectStore;

pub const DEMO_EMAIL: &str = "pm.demo@sitepulse.dev";
pub const DEMO_PASSWORD: &str = "Demo@123";

fn date(raw: &str) -> DateTime<Utc> {
    format!("{raw}T00:00:00Z")
        .parse()
        .unwrap_or_else(|_| Utc::now())
}

struct TaskSpec {
    title: &'static str,
    description: &'static str,
    category: TaskCategory,
    priority: TaskPriority,
    status: TaskStatus,
    assignee: &'static str,
    due: &'static str,
}

struct LogSpec {
    date: &'static str,
    planned: u8,
    actual: u8,
    manpower: u32,
    weather: Weather,
    incidents: u32,
    blockers: &'static [&'static str],
    notes: &'static str,
}

const TASKS: &[TaskSpec] = &[
    TaskSpec {
        title: "Basement slab concrete - Block B2",
        description: "Complete concrete pour and vibration for B2 segment.",
        category: TaskCategory::Execution,
        priority: TaskPriority::High,
        status: TaskStatus::Done,
        assignee: "Civil Team A",
        due: "2026-01-28",
    },
    TaskSpec {
        title: "Rebar procurement for podium floor",
        description: "Vendor finalization and PO release for TMT steel.",
        category: TaskCategory::Procurement,
        priority: TaskPriority::High,
        status: TaskStatus::Blocked,
        assignee: "Procurement Lead",
        due: "2026-02-15",
    },
    TaskSpec {
        title: "MEP sleeves inspection - Zone 3",
        description: "QA check before slab casting.",
        category: TaskCategory::QaQc,
        priority: TaskPriority::Medium,
        status: TaskStatus::InProgress,
        assignee: "QA Engineer",
        due: "2026-03-03",
    },
    TaskSpec {
        title: "Safety harness compliance audit",
        description: "Weekly audit for work-at-height areas.",
        category: TaskCategory::Safety,
        priority: TaskPriority::High,
        status: TaskStatus::Todo,
        assignee: "EHS Officer",
        due: "2026-02-22",
    },
    TaskSpec {
        title: "Subcontractor RA bill verification",
        description: "Validate quantities for February billing cycle.",
        category: TaskCategory::Billing,
        priority: TaskPriority::Medium,
        status: TaskStatus::Todo,
        assignee: "QS Team",
        due: "2026-02-20",
    },
];

const LOGS: &[LogSpec] = &[
    LogSpec {
        date: "2026-02-21",
        planned: 44,
        actual: 41,
        manpower: 126,
        weather: Weather::Clear,
        incidents: 0,
        blockers: &["Rebar delivery pending from vendor"],
        notes: "Formwork completed in Zone 2.",
    },
    LogSpec {
        date: "2026-02-22",
        planned: 45,
        actual: 41,
        manpower: 109,
        weather: Weather::Rain,
        incidents: 1,
        blockers: &["Rain interruption", "Scaffolding rework in podium edge"],
        notes: "Concrete pour moved to next day.",
    },
    LogSpec {
        date: "2026-02-23",
        planned: 46,
        actual: 42,
        manpower: 133,
        weather: Weather::Clear,
        incidents: 0,
        blockers: &["Mechanical pump availability limited"],
        notes: "Partial recovery achieved.",
    },
];

/// Seeds the demo account and project. Returns the project id so the CLI
/// can print ready-to-use analytics commands.
pub fn seed_demo(store: &ProjectStore) -> Result<String> {
    let now = Utc::now();

    let user = match store.find_user_by_email(DEMO_EMAIL)? {
        Some(existing) => existing,
        None => {
            let user = User {
                id: Uuid::new_v4().to_string(),
                name: "Ravi Kumar".to_string(),
                email: DEMO_EMAIL.to_string(),
                password_hash: hash_password(DEMO_PASSWORD)?,
                role: Role::ProjectManager,
                created_at: now,
            };
            store.insert_user(&user)?;
            user
        }
    };

    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: "Hyderabad Tech Park Tower A".to_string(),
        client: "Infranova Realty Pvt Ltd".to_string(),
        location: "HITEC City, Hyderabad".to_string(),
        start_date: date("2025-09-01"),
        end_date: date("2026-08-31"),
        budget: 185_000_000.0,
        status: ProjectStatus::Active,
        progress: 42,
        created_by: user.id.clone(),
        created_at: now,
    };
    store.insert_project(&project)?;

    for spec in TASKS {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            title: spec.title.to_string(),
            description: Some(spec.description.to_string()),
            category: spec.category,
            priority: spec.priority,
            status: spec.status,
            assignee: Some(spec.assignee.to_string()),
            due_date: Some(date(spec.due)),
            completed_at: spec.status.is_done().then_some(now),
            created_at: now,
        };
        store.insert_task(&task)?;
    }

    for spec in LOGS {
        let log = DailyLog {
            id: Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            date: date(spec.date),
            planned_progress: spec.planned,
            actual_progress: spec.actual,
            manpower: spec.manpower,
            weather: spec.weather,
            safety_incidents: spec.incidents,
            blockers: spec.blockers.iter().map(|b| b.to_string()).collect(),
            notes: Some(spec.notes.to_string()),
            created_at: now,
        };
        store.insert_daily_log(&log)?;
    }

    info!("seeded demo project {}", project.id);
    Ok(project.id)
}
