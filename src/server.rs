use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::analytics::{build_delay_forecast, build_risk_insights, DelayForecast, RiskInsights};
use crate::auth::{hash_password, issue_token, verify_password, verify_token, Claims};
use crate::config::Config;
use crate::domain::{
    DailyLog, Project, ProjectStatus, Role, Task, TaskCategory, TaskPriority, TaskStatus, User,
    Weather,
};
use crate::store::{ProjectPatch, ProjectStore, TaskPatch};

/// Log windows handed to the two scorers. The engine self-limits its
/// recency windows; these only bound how much history we load.
const RISK_LOG_WINDOW: usize = 10;
const DELAY_LOG_WINDOW: usize = 20;

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Authenticated caller, extracted from the Authorization header. Every
/// route except /api/health and the auth endpoints requires it, so role
/// checks happen before the engine is ever invoked.
struct AuthUser(Claims);

fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ").map(str::trim)
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token =
            extract_bearer(header).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        let claims = verify_token(token, &state.config.auth.jwt_secret)
            .map_err(|_| ApiError::unauthorized("Invalid token"))?;
        Ok(AuthUser(claims))
    }
}

fn require_role(claims: &Claims, allowed: &[Role]) -> std::result::Result<(), ApiError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Forbidden: insufficient role permission"))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct PublicUser {
    id: String,
    name: String,
    email: String,
    role: Role,
}

impl PublicUser {
    fn of(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: PublicUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest {
    name: String,
    client: String,
    location: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    budget: f64,
    status: Option<ProjectStatus>,
    progress: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskRequest {
    project_id: String,
    title: String,
    description: Option<String>,
    category: Option<TaskCategory>,
    priority: Option<TaskPriority>,
    status: Option<TaskStatus>,
    assignee: Option<String>,
    due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDailyLogRequest {
    project_id: String,
    date: Option<DateTime<Utc>>,
    planned_progress: u8,
    actual_progress: u8,
    manpower: Option<u32>,
    weather: Option<Weather>,
    safety_incidents: Option<u32>,
    blockers: Option<Vec<String>>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectQuery {
    #[serde(rename = "projectId")]
    project_id: String,
}

pub async fn run_server(config: Config) -> Result<()> {
    let bind: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = ApiState {
        db_path: config.resolved_db_path(),
        config,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:project_id",
            get(get_project).patch(update_project),
        )
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/:task_id", patch(update_task))
        .route("/api/daily-logs", get(list_daily_logs).post(create_daily_log))
        .route("/api/analytics/project/:project_id/risk", get(project_risk))
        .route(
            "/api/intelligence/project/:project_id/delay-prediction",
            get(project_delay_prediction),
        )
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: "sitepulse-api",
    })
}

fn open_store(state: &ApiState) -> std::result::Result<ProjectStore, ApiError> {
    ProjectStore::open(&state.db_path).map_err(ApiError::internal)
}

async fn register(
    State(state): State<ApiState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    if request.name.trim().len() < 2 {
        return Err(ApiError::bad_request("name must be at least 2 characters"));
    }
    if !request.email.contains('@') {
        return Err(ApiError::bad_request("invalid email"));
    }
    if request.password.len() < 6 {
        return Err(ApiError::bad_request(
            "password must be at least 6 characters",
        ));
    }

    let store = open_store(&state)?;
    if store
        .find_user_by_email(&request.email)
        .map_err(ApiError::internal)?
        .is_some()
    {
        return Err(ApiError::conflict("User already exists"));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        email: request.email.to_lowercase(),
        password_hash: hash_password(&request.password).map_err(ApiError::internal)?,
        role: request.role.unwrap_or(Role::SiteEngineer),
        created_at: Utc::now(),
    };
    store.insert_user(&user).map_err(ApiError::internal)?;

    let token = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )
    .map_err(ApiError::internal)?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::of(&user),
    }))
}

async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let store = open_store(&state)?;
    let user = store
        .find_user_by_email(&request.email.to_lowercase())
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )
    .map_err(ApiError::internal)?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::of(&user),
    }))
}

async fn me(State(state): State<ApiState>, AuthUser(claims): AuthUser) -> ApiResult<PublicUser> {
    let store = open_store(&state)?;
    let user = store
        .find_user(&claims.sub)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(PublicUser::of(&user)))
}

async fn list_projects(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
) -> ApiResult<Vec<Project>> {
    let store = open_store(&state)?;
    let projects = store.list_projects().map_err(ApiError::internal)?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    require_role(&claims, &[Role::ProjectManager])?;
    if request.name.trim().len() < 3 {
        return Err(ApiError::bad_request("name must be at least 3 characters"));
    }
    if request.client.trim().len() < 2 || request.location.trim().len() < 2 {
        return Err(ApiError::bad_request("client and location are required"));
    }
    if request.budget < 0.0 {
        return Err(ApiError::bad_request("budget must be non-negative"));
    }
    if request.progress.is_some_and(|p| p > 100) {
        return Err(ApiError::bad_request("progress must be within 0-100"));
    }

    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        client: request.client.trim().to_string(),
        location: request.location.trim().to_string(),
        start_date: request.start_date,
        end_date: request.end_date,
        budget: request.budget,
        status: request.status.unwrap_or(ProjectStatus::Planning),
        progress: request.progress.unwrap_or(0),
        created_by: claims.sub,
        created_at: Utc::now(),
    };
    let store = open_store(&state)?;
    store.insert_project(&project).map_err(ApiError::internal)?;
    Ok(Json(project))
}

async fn get_project(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<Project> {
    let store = open_store(&state)?;
    let project = store
        .get_project(&project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Path(project_id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> ApiResult<Project> {
    require_role(&claims, &[Role::ProjectManager])?;
    if patch.progress.is_some_and(|p| p > 100) {
        return Err(ApiError::bad_request("progress must be within 0-100"));
    }
    if patch.budget.is_some_and(|b| b < 0.0) {
        return Err(ApiError::bad_request("budget must be non-negative"));
    }
    let store = open_store(&state)?;
    let project = store
        .update_project(&project_id, &patch)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    Ok(Json(project))
}

async fn list_tasks(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Vec<Task>> {
    let store = open_store(&state)?;
    let tasks = store
        .list_tasks(&query.project_id)
        .map_err(ApiError::internal)?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    require_role(&claims, &[Role::ProjectManager, Role::SiteEngineer])?;
    if request.title.trim().len() < 3 {
        return Err(ApiError::bad_request("title must be at least 3 characters"));
    }

    let store = open_store(&state)?;
    if store
        .get_project(&request.project_id)
        .map_err(ApiError::internal)?
        .is_none()
    {
        return Err(ApiError::not_found("Project not found"));
    }

    let task = Task {
        id: Uuid::new_v4().to_string(),
        project_id: request.project_id,
        title: request.title.trim().to_string(),
        description: request.description,
        category: request.category.unwrap_or(TaskCategory::Execution),
        priority: request.priority.unwrap_or(TaskPriority::Medium),
        status: request.status.unwrap_or(TaskStatus::Todo),
        assignee: request.assignee,
        due_date: request.due_date,
        completed_at: None,
        created_at: Utc::now(),
    };
    store.insert_task(&task).map_err(ApiError::internal)?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Path(task_id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Task> {
    require_role(&claims, &[Role::ProjectManager, Role::SiteEngineer])?;
    if patch.title.as_deref().is_some_and(|t| t.trim().len() < 3) {
        return Err(ApiError::bad_request("title must be at least 3 characters"));
    }
    let store = open_store(&state)?;
    let task = store
        .update_task(&task_id, &patch)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(Json(task))
}

async fn list_daily_logs(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
    Query(query): Query<ProjectQuery>,
) -> ApiResult<Vec<DailyLog>> {
    let store = open_store(&state)?;
    let logs = store
        .list_daily_logs(&query.project_id, None)
        .map_err(ApiError::internal)?;
    Ok(Json(logs))
}

async fn create_daily_log(
    State(state): State<ApiState>,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateDailyLogRequest>,
) -> ApiResult<DailyLog> {
    require_role(&claims, &[Role::ProjectManager, Role::SiteEngineer])?;
    if request.planned_progress > 100 || request.actual_progress > 100 {
        return Err(ApiError::bad_request("progress must be within 0-100"));
    }

    let store = open_store(&state)?;
    if store
        .get_project(&request.project_id)
        .map_err(ApiError::internal)?
        .is_none()
    {
        return Err(ApiError::not_found("Project not found"));
    }

    let log = DailyLog {
        id: Uuid::new_v4().to_string(),
        project_id: request.project_id.clone(),
        date: request.date.unwrap_or_else(Utc::now),
        planned_progress: request.planned_progress,
        actual_progress: request.actual_progress,
        manpower: request.manpower.unwrap_or(0),
        weather: request.weather.unwrap_or(Weather::Unknown),
        safety_incidents: request.safety_incidents.unwrap_or(0),
        blockers: request.blockers.unwrap_or_default(),
        notes: request.notes,
        created_at: Utc::now(),
    };
    store.insert_daily_log(&log).map_err(ApiError::internal)?;

    // The newest actual progress becomes the project's progress; a full
    // project flips to completed.
    let patch = ProjectPatch {
        progress: Some(request.actual_progress),
        status: (request.actual_progress >= 100).then_some(ProjectStatus::Completed),
        budget: None,
    };
    store
        .update_project(&request.project_id, &patch)
        .map_err(ApiError::internal)?;

    Ok(Json(log))
}

async fn project_risk(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<RiskInsights> {
    let store = open_store(&state)?;
    let project = store
        .get_project(&project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    let tasks = store.list_tasks(&project_id).map_err(ApiError::internal)?;
    let logs = store
        .list_daily_logs(&project_id, Some(RISK_LOG_WINDOW))
        .map_err(ApiError::internal)?;
    Ok(Json(build_risk_insights(&project, &tasks, &logs, Utc::now())))
}

async fn project_delay_prediction(
    State(state): State<ApiState>,
    AuthUser(_claims): AuthUser,
    Path(project_id): Path<String>,
) -> ApiResult<DelayForecast> {
    let store = open_store(&state)?;
    let project = store
        .get_project(&project_id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    let tasks = store.list_tasks(&project_id).map_err(ApiError::internal)?;
    let logs = store
        .list_daily_logs(&project_id, Some(DELAY_LOG_WINDOW))
        .map_err(ApiError::internal)?;
    Ok(Json(build_delay_forecast(&project, &tasks, &logs, Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn role_gate() {
        let claims = Claims {
            sub: "u1".into(),
            name: "Asha".into(),
            email: "a@b.c".into(),
            role: Role::Viewer,
            exp: 0,
        };
        assert!(require_role(&claims, &[Role::Viewer]).is_ok());
        assert!(require_role(&claims, &[Role::ProjectManager]).is_err());
    }
}
