pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    AppState, CalendarListResponse, CommandError, DeleteDayPlanResponse, SaveDayPlanRequest,
    ScheduleTaskRequest, ScheduleTaskResponse, busy_snapshot_impl, delete_day_plan_impl,
    get_day_plan_impl, list_calendars_impl, propose_task_impl, save_day_plan_impl,
};
use application::logging::init_logging;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use domain::error::ErrorCode;
use domain::models::DayPlan;
use infrastructure::config::load_server_address_from_lookup;
use infrastructure::error::InfraError;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CALENDAR_TOKEN_HEADER: &str = "x-calendar-token";

#[derive(Debug)]
pub struct ApiError(CommandError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::Validation | ErrorCode::Overlap => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::NoSlot | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.0 }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    header_value(headers, USER_ID_HEADER).ok_or_else(|| ApiError(CommandError::unauthenticated()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn json_body<T>(command: &str, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        warn!(command, %rejection, "rejected request body");
        ApiError(CommandError::new(
            ErrorCode::Validation,
            format!("Invalid payload: {}", rejection.body_text()),
        ))
    })
}

/// Runs a SQLite-backed command on the blocking pool.
async fn run_blocking<T, F>(
    state: &Arc<AppState>,
    command: &'static str,
    work: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, InfraError> + Send + 'static,
    T: Send + 'static,
{
    let worker_state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || work(&worker_state)).await {
        Ok(result) => result.map_err(|error| ApiError(state.command_error(command, &error))),
        Err(join_error) => {
            error!(command, %join_error, "blocking command did not complete");
            Err(ApiError(CommandError::new(ErrorCode::Internal, "Internal error")))
        }
    }
}

async fn ping() -> &'static str {
    "pong"
}

async fn get_day_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<DayPlan>, ApiError> {
    let user_id = user_id(&headers)?;
    run_blocking(&state, "get_day_plan", move |state| {
        get_day_plan_impl(state, &user_id, query.date)
    })
    .await
    .map(Json)
}

async fn save_day_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
    body: Result<Json<SaveDayPlanRequest>, JsonRejection>,
) -> Result<Json<DayPlan>, ApiError> {
    let user_id = user_id(&headers)?;
    let request = json_body("save_day_plan", body)?;
    run_blocking(&state, "save_day_plan", move |state| {
        save_day_plan_impl(state, &user_id, query.date, request)
    })
    .await
    .map(Json)
}

async fn delete_day_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<DeleteDayPlanResponse>, ApiError> {
    let user_id = user_id(&headers)?;
    run_blocking(&state, "delete_day_plan", move |state| {
        delete_day_plan_impl(state, &user_id, query.date)
    })
    .await
    .map(Json)
}

async fn schedule_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
    body: Result<Json<ScheduleTaskRequest>, JsonRejection>,
) -> Result<Json<ScheduleTaskResponse>, ApiError> {
    let user_id = user_id(&headers)?;
    let ScheduleTaskRequest { task, busy } = json_body("schedule_task", body)?;
    let calendar_token = header_value(&headers, CALENDAR_TOKEN_HEADER);
    let busy = busy_snapshot_impl(&state, query.date.clone(), busy, calendar_token)
        .await
        .map_err(|error| ApiError(state.command_error("schedule_task", &error)))?;
    run_blocking(&state, "schedule_task", move |state| {
        propose_task_impl(state, &user_id, query.date, &task, busy)
    })
    .await
    .map(Json)
}

async fn list_calendars(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CalendarListResponse>, ApiError> {
    user_id(&headers)?;
    let calendar_token = header_value(&headers, CALENDAR_TOKEN_HEADER);
    list_calendars_impl(&state, calendar_token)
        .await
        .map(Json)
        .map_err(|error| ApiError(state.command_error("list_calendars", &error)))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route(
            "/api/dayplan",
            get(get_day_plan).put(save_day_plan).delete(delete_day_plan),
        )
        .route("/api/dayplan/schedule", post(schedule_task))
        .route("/api/calendar/calendars", get(list_calendars))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), InfraError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

pub async fn run() -> Result<(), InfraError> {
    let workspace_root = match std::env::var("DAYPLAN_WORKSPACE") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
        _ => std::env::current_dir()?,
    };

    let state = Arc::new(AppState::new(workspace_root.clone())?);
    init_logging(state.logs_dir())?;
    let address =
        load_server_address_from_lookup(state.config_dir(), |key| std::env::var(key).ok())?;

    let listener = TcpListener::bind(address.socket_addr()).await?;
    info!(
        address = %listener.local_addr()?,
        workspace = %workspace_root.display(),
        "day plan server listening"
    );
    serve(listener, state).await
}
