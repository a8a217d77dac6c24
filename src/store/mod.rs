pub mod migrations;

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::domain::{
    DailyLog, Project, ProjectStatus, Task, TaskCategory, TaskPriority, TaskStatus, User, Weather,
};
use crate::store::migrations::BASE_MIGRATION;

/// SQLite persistence for users, projects, tasks and daily logs. The
/// analytics engine never touches this; handlers load snapshots here and
/// hand them over.
pub struct ProjectStore {
    conn: Connection,
}

/// Mutable project fields. Everything else is immutable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub status: Option<ProjectStatus>,
    pub progress: Option<u8>,
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl ProjectStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO users(id, name, email, password_hash, role, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.role.as_slug(),
                user.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .prepare(
                "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = ?1",
            )?
            .query_row(params![email], row_to_user)
            .optional()
            .map_err(Into::into)
    }

    pub fn find_user(&self, id: &str) -> Result<Option<User>> {
        self.conn
            .prepare(
                "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = ?1",
            )?
            .query_row(params![id], row_to_user)
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_project(&self, project: &Project) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO projects(
    id, name, client, location, start_date, end_date,
    budget, status, progress, created_by, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                project.id,
                project.name,
                project.client,
                project.location,
                project.start_date.to_rfc3339(),
                project.end_date.to_rfc3339(),
                project.budget,
                project.status.as_slug(),
                project.progress,
                project.created_by,
                project.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, name, client, location, start_date, end_date,
       budget, status, progress, created_by, created_at
FROM projects
ORDER BY created_at DESC
"#,
        )?;
        let rows = stmt
            .query_map([], row_to_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.conn
            .prepare(
                r#"
SELECT id, name, client, location, start_date, end_date,
       budget, status, progress, created_by, created_at
FROM projects
WHERE id = ?1
"#,
            )?
            .query_row(params![id], row_to_project)
            .optional()
            .map_err(Into::into)
    }

    pub fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Option<Project>> {
        let Some(mut project) = self.get_project(id)? else {
            return Ok(None);
        };
        if let Some(status) = patch.status {
            project.status = status;
        }
        if let Some(progress) = patch.progress {
            project.progress = progress;
        }
        if let Some(budget) = patch.budget {
            project.budget = budget;
        }
        self.conn.execute(
            "UPDATE projects SET status = ?2, progress = ?3, budget = ?4 WHERE id = ?1",
            params![id, project.status.as_slug(), project.progress, project.budget],
        )?;
        Ok(Some(project))
    }

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO tasks(
    id, project_id, title, description, category, priority,
    status, assignee, due_date, completed_at, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                task.id,
                task.project_id,
                task.title,
                task.description,
                task.category.as_slug(),
                task.priority.as_slug(),
                task.status.as_slug(),
                task.assignee,
                task.due_date.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, project_id, title, description, category, priority,
       status, assignee, due_date, completed_at, created_at
FROM tasks
WHERE project_id = ?1
ORDER BY created_at DESC
"#,
        )?;
        let rows = stmt
            .query_map(params![project_id], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.conn
            .prepare(
                r#"
SELECT id, project_id, title, description, category, priority,
       status, assignee, due_date, completed_at, created_at
FROM tasks
WHERE id = ?1
"#,
            )?
            .query_row(params![id], row_to_task)
            .optional()
            .map_err(Into::into)
    }

    /// Applies a patch to a task. Moving a task to `done` stamps
    /// `completed_at`; moving it out of `done` clears the stamp.
    pub fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(mut task) = self.get_task(id)? else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(status) = patch.status {
            if status.is_done() && !task.status.is_done() {
                task.completed_at = Some(Utc::now());
            } else if !status.is_done() {
                task.completed_at = None;
            }
            task.status = status;
        }
        if let Some(assignee) = &patch.assignee {
            task.assignee = Some(assignee.clone());
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        self.conn.execute(
            r#"
UPDATE tasks SET
    title = ?2, description = ?3, category = ?4, priority = ?5,
    status = ?6, assignee = ?7, due_date = ?8, completed_at = ?9
WHERE id = ?1
"#,
            params![
                id,
                task.title,
                task.description,
                task.category.as_slug(),
                task.priority.as_slug(),
                task.status.as_slug(),
                task.assignee,
                task.due_date.map(|d| d.to_rfc3339()),
                task.completed_at.map(|d| d.to_rfc3339())
            ],
        )?;
        Ok(Some(task))
    }

    pub fn insert_daily_log(&self, log: &DailyLog) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO daily_logs(
    id, project_id, date, planned_progress, actual_progress,
    manpower, weather, safety_incidents, blockers_json, notes, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                log.id,
                log.project_id,
                log.date.to_rfc3339(),
                log.planned_progress,
                log.actual_progress,
                log.manpower,
                log.weather.as_slug(),
                log.safety_incidents,
                serde_json::to_string(&log.blockers)?,
                log.notes,
                log.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Daily logs for a project, newest-first. This ordering is what the
    /// analytics engine expects; callers must not reorder.
    pub fn list_daily_logs(&self, project_id: &str, limit: Option<usize>) -> Result<Vec<DailyLog>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, project_id, date, planned_progress, actual_progress,
       manpower, weather, safety_incidents, blockers_json, notes, created_at
FROM daily_logs
WHERE project_id = ?1
ORDER BY date DESC, created_at DESC
LIMIT ?2
"#,
        )?;
        let limit = limit.map_or(i64::MAX, |n| n as i64);
        let rows = stmt
            .query_map(params![project_id, limit], row_to_daily_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_datetime(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_datetime(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.map(parse_datetime)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = row.get(4)?;
    let created_at_raw: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: role_raw.parse().unwrap_or(crate::domain::Role::Viewer),
        created_at: parse_datetime(created_at_raw),
    })
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let status_raw: String = row.get(7)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        client: row.get(2)?,
        location: row.get(3)?,
        start_date: parse_datetime(row.get(4)?),
        end_date: parse_datetime(row.get(5)?),
        budget: row.get(6)?,
        status: status_raw.parse().unwrap_or(ProjectStatus::Planning),
        progress: row.get::<_, i64>(8)?.clamp(0, 100) as u8,
        created_by: row.get(9)?,
        created_at: parse_datetime(row.get(10)?),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let category_raw: String = row.get(4)?;
    let priority_raw: String = row.get(5)?;
    let status_raw: String = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: category_raw.parse().unwrap_or(TaskCategory::Execution),
        priority: priority_raw.parse().unwrap_or(TaskPriority::Medium),
        status: status_raw.parse().unwrap_or(TaskStatus::Todo),
        assignee: row.get(7)?,
        due_date: parse_opt_datetime(row.get(8)?),
        completed_at: parse_opt_datetime(row.get(9)?),
        created_at: parse_datetime(row.get(10)?),
    })
}

fn row_to_daily_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyLog> {
    let weather_raw: String = row.get(6)?;
    let blockers_raw: String = row.get(8)?;
    Ok(DailyLog {
        id: row.get(0)?,
        project_id: row.get(1)?,
        date: parse_datetime(row.get(2)?),
        planned_progress: row.get::<_, i64>(3)?.clamp(0, 100) as u8,
        actual_progress: row.get::<_, i64>(4)?.clamp(0, 100) as u8,
        manpower: row.get::<_, i64>(5)?.max(0) as u32,
        weather: weather_raw.parse().unwrap_or(Weather::Unknown),
        safety_incidents: row.get::<_, i64>(7)?.max(0) as u32,
        blockers: serde_json::from_str(&blockers_raw).unwrap_or_default(),
        notes: row.get(9)?,
        created_at: parse_datetime(row.get(10)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Duration;
    use uuid::Uuid;

    fn sample_project(store: &ProjectStore) -> Project {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: "Metro Depot".into(),
            client: "Transit Authority".into(),
            location: "Pune".into(),
            start_date: now,
            end_date: now + Duration::days(365),
            budget: 90_000_000.0,
            status: ProjectStatus::Active,
            progress: 10,
            created_by: "u1".into(),
            created_at: now,
        };
        store.insert_project(&project).unwrap();
        project
    }

    #[test]
    fn project_round_trip_and_patch() {
        let store = ProjectStore::open_in_memory().unwrap();
        let project = sample_project(&store);

        let loaded = store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Metro Depot");
        assert_eq!(loaded.status, ProjectStatus::Active);

        let patched = store
            .update_project(
                &project.id,
                &ProjectPatch {
                    status: Some(ProjectStatus::Delayed),
                    progress: Some(55),
                    budget: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(patched.status, ProjectStatus::Delayed);
        assert_eq!(patched.progress, 55);
        assert_eq!(patched.budget, 90_000_000.0);

        assert!(store.get_project("missing").unwrap().is_none());
        assert!(store
            .update_project("missing", &ProjectPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn task_done_transition_stamps_completed_at() {
        let store = ProjectStore::open_in_memory().unwrap();
        let project = sample_project(&store);
        let task = Task {
            id: Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            title: "Pour slab".into(),
            description: None,
            category: TaskCategory::Execution,
            priority: TaskPriority::High,
            status: TaskStatus::InProgress,
            assignee: Some("Civil Team A".into()),
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        store.insert_task(&task).unwrap();

        let done = store
            .update_task(
                &task.id,
                &TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(done.completed_at.is_some());

        let reopened = store
            .update_task(
                &task.id,
                &TaskPatch {
                    status: Some(TaskStatus::Todo),
                    ..TaskPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn daily_logs_come_back_newest_first_with_limit() {
        let store = ProjectStore::open_in_memory().unwrap();
        let project = sample_project(&store);
        let base = Utc::now();
        for day in 0..4 {
            let log = DailyLog {
                id: Uuid::new_v4().to_string(),
                project_id: project.id.clone(),
                date: base + Duration::days(day),
                planned_progress: 10 + day as u8,
                actual_progress: 8,
                manpower: 25,
                weather: Weather::Clear,
                safety_incidents: 0,
                blockers: vec![format!("blocker {day}")],
                notes: None,
                created_at: base,
            };
            store.insert_daily_log(&log).unwrap();
        }

        let logs = store.list_daily_logs(&project.id, Some(3)).unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].planned_progress, 13);
        assert!(logs.windows(2).all(|pair| pair[0].date >= pair[1].date));
        assert_eq!(logs[0].blockers, vec!["blocker 3".to_string()]);

        let all = store.list_daily_logs(&project.id, None).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn user_lookup_by_email() {
        let store = ProjectStore::open_in_memory().unwrap();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: "Ravi Kumar".into(),
            email: "pm@example.com".into(),
            password_hash: "hash".into(),
            role: Role::ProjectManager,
            created_at: Utc::now(),
        };
        store.insert_user(&user).unwrap();

        let found = store.find_user_by_email("pm@example.com").unwrap().unwrap();
        assert_eq!(found.role, Role::ProjectManager);
        assert!(store.find_user_by_email("absent@example.com").unwrap().is_none());

        // UNIQUE(email) rejects duplicates.
        assert!(store.insert_user(&user).is_err());
    }
}
