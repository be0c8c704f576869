//! HTTP server implementation for the Timely JSON API.

use axum::{
    Router,
    extract::{Form, FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::forms::{
    ApiKeyForm, ClassForm, CompleteForm, GroupRequest, IterationPath, TaskForm, TaskListQuery,
    WeekQuery,
};
use crate::calendar::{WEEK_DATE_FORMAT, adjacent_week, current_week, parse_week_date};
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::types::{ClassId, ClassInput, ImportRecord, TaskDetails, TaskId};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    /// Header carrying the user id asserted by the login gateway.
    user_header: Arc<str>,
}

impl AppState {
    pub fn new(db: Arc<Database>, user_header: &str) -> Self {
        Self {
            db,
            user_header: Arc::from(user_header),
        }
    }

    /// Get the database reference.
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }
}

/// The authenticated user of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(&*state.user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(AppError::unauthenticated)?
            .to_string();

        state.db().ensure_user(&username)?;
        Ok(CurrentUser(username))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "Request failed");
        } else {
            tracing::debug!(code = ?self.code, message = %self.message, "Request rejected");
        }
        (status, Json(json!({ "success": false, "error": self }))).into_response()
    }
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// Tasks

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<TaskForm>,
) -> AppResult<impl IntoResponse> {
    let details = TaskDetails::try_from(form)?;
    let created = state.db().create_task(&user, &details)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TaskListQuery>,
) -> AppResult<impl IntoResponse> {
    let tasks = state.db().list_tasks(&user, query.sort()?)?;
    Ok(Json(tasks))
}

async fn calendar_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().calendar_tasks(&user)?))
}

async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().get_task_with_iterations(&user, task_id)?))
}

async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    state.db().delete_task(&user, task_id)?;
    Ok(success())
}

async fn task_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
) -> AppResult<impl IntoResponse> {
    let view = state.db().get_task_details(&user, path.task_id, path.iteration)?;
    Ok(Json(view))
}

async fn edit_task_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
    Form(form): Form<TaskForm>,
) -> AppResult<impl IntoResponse> {
    let details = TaskDetails::try_from(form)?;
    let view = state
        .db()
        .update_task_details(&user, path.task_id, path.iteration, &details)?;
    Ok(Json(view))
}

async fn delete_iteration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
) -> AppResult<impl IntoResponse> {
    state.db().delete_iteration(&user, path.task_id, path.iteration)?;
    Ok(success())
}

async fn complete_iteration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
    Form(form): Form<CompleteForm>,
) -> AppResult<impl IntoResponse> {
    let iteration = state.db().complete_iteration(
        &user,
        path.task_id,
        path.iteration,
        form.actual_time()?,
    )?;
    Ok(Json(iteration))
}

async fn uncomplete_iteration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
) -> AppResult<impl IntoResponse> {
    let iteration = state
        .db()
        .uncomplete_iteration(&user, path.task_id, path.iteration)?;
    Ok(Json(iteration))
}

async fn graph_data(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<IterationPath>,
) -> AppResult<impl IntoResponse> {
    let series = state.db().graph_series(&user, path.task_id, path.iteration)?;
    Ok(Json(series))
}

async fn group_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<GroupRequest>,
) -> AppResult<impl IntoResponse> {
    let task = state.db().group_tasks(&user, &request.task_ids, &request.title)?;
    Ok(Json(task))
}

// Classes

async fn list_classes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().list_classes(&user)?))
}

async fn create_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ClassForm>,
) -> AppResult<impl IntoResponse> {
    let input = ClassInput::try_from(form)?;
    let class = state.db().create_class(&user, &input)?;
    Ok((StatusCode::CREATED, Json(class)))
}

async fn class_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<ClassId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().get_class(&user, class_id)?))
}

async fn edit_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<ClassId>,
    Form(form): Form<ClassForm>,
) -> AppResult<impl IntoResponse> {
    let input = ClassInput::try_from(form)?;
    Ok(Json(state.db().update_class(&user, class_id, &input)?))
}

async fn delete_class(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<ClassId>,
) -> AppResult<impl IntoResponse> {
    state.db().delete_class(&user, class_id)?;
    Ok(success())
}

async fn class_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<ClassId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().tasks_for_class(&user, class_id)?))
}

async fn class_groups(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(class_id): Path<ClassId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().task_groups(&user, class_id)?))
}

async fn available_colors(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.db().available_colors(&user)?))
}

// Import

async fn set_api_key(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ApiKeyForm>,
) -> AppResult<impl IntoResponse> {
    state
        .db()
        .set_api_key(&user, form.api_key.as_deref().unwrap_or_default())?;
    Ok(success())
}

async fn import_records(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(records): Json<Vec<ImportRecord>>,
) -> AppResult<impl IntoResponse> {
    let summary = state.db().import_records(&user, &records)?;
    Ok(Json(summary))
}

// Calendar

async fn calendar_week(
    CurrentUser(_user): CurrentUser,
    Query(query): Query<WeekQuery>,
) -> AppResult<impl IntoResponse> {
    let week = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => current_week(chrono::Local::now().date_naive()),
        Some(date) => {
            let sunday = parse_week_date(date).ok_or_else(|| {
                AppError::invalid_value("date", format!("'{}' is not a MM/DD/YY date", date))
            })?;
            match query.direction.as_deref() {
                Some("prev") => adjacent_week(sunday, true),
                Some("next") => adjacent_week(sunday, false),
                None | Some("") => current_week(sunday),
                Some(other) => {
                    return Err(AppError::invalid_value(
                        "direction",
                        format!("'{}' is not prev or next", other),
                    ));
                }
            }
        }
    };

    let days: Vec<String> = week
        .iter()
        .map(|d| d.format(WEEK_DATE_FORMAT).to_string())
        .collect();
    Ok(Json(json!({ "days": days })))
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/calendar", get(calendar_tasks))
        .route("/tasks/{task_id}", get(get_task).delete(delete_task))
        .route(
            "/tasks/{task_id}/iterations/{iteration}",
            get(task_details)
                .post(edit_task_details)
                .delete(delete_iteration),
        )
        .route(
            "/tasks/{task_id}/iterations/{iteration}/complete",
            post(complete_iteration),
        )
        .route(
            "/tasks/{task_id}/iterations/{iteration}/uncomplete",
            post(uncomplete_iteration),
        )
        .route("/tasks/{task_id}/iterations/{iteration}/graph", get(graph_data))
        .route("/groups", post(group_tasks))
        .route("/classes", get(list_classes).post(create_class))
        .route(
            "/classes/{class_id}",
            get(class_details).post(edit_class).delete(delete_class),
        )
        .route("/classes/{class_id}/tasks", get(class_tasks))
        .route("/classes/{class_id}/groups", get(class_groups))
        .route("/colors", get(available_colors))
        .route("/api-key", post(set_api_key))
        .route("/import", post(import_records))
        .route("/calendar/week", get(calendar_week))
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    db: Arc<Database>,
    config: &Config,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let state = AppState::new(db, &config.auth.user_header);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Timely listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Server shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
