use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::busy_time::{BusySnapshot, BusyTimeService, RetryPolicy};
use crate::application::day_plan_service::DayPlanService;
use crate::domain::error::{Advisory, ErrorCode, PlanError};
use crate::domain::models::{Block, BlockInput, DayPlan, TaskRequest, parse_date_key};
use crate::domain::scheduler::Scheduler;
use crate::infrastructure::config::{
    CalendarSettings, read_calendar_settings, read_placement_policy, read_timezone,
};
use crate::infrastructure::day_plan_repository::{DayPlanRepository, SqliteDayPlanRepository};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::BusyEvent;
use crate::infrastructure::google_calendar_client::{
    GoogleCalendarClient, GoogleCalendarSummary, ReqwestGoogleCalendarClient,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    day_plans: DayPlanService<dyn DayPlanRepository>,
    calendar_client: Arc<dyn GoogleCalendarClient>,
    calendar_settings: CalendarSettings,
    timezone: Option<Tz>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let calendar_settings = read_calendar_settings(&bootstrap.config_dir)?;
        let client = ReqwestGoogleCalendarClient::new(
            calendar_settings.api_base_url.as_deref(),
            calendar_settings.request_timeout,
        )?;
        Self::from_bootstrap(bootstrap, calendar_settings, Arc::new(client))
    }

    pub fn with_calendar_client(
        workspace_root: PathBuf,
        calendar_client: Arc<dyn GoogleCalendarClient>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let calendar_settings = read_calendar_settings(&bootstrap.config_dir)?;
        Self::from_bootstrap(bootstrap, calendar_settings, calendar_client)
    }

    fn from_bootstrap(
        bootstrap: BootstrapResult,
        calendar_settings: CalendarSettings,
        calendar_client: Arc<dyn GoogleCalendarClient>,
    ) -> Result<Self, InfraError> {
        let scheduler = Scheduler::new(read_placement_policy(&bootstrap.config_dir)?)?;
        let timezone = read_timezone(&bootstrap.config_dir)?;
        let repository: Arc<dyn DayPlanRepository> =
            Arc::new(SqliteDayPlanRepository::new(&bootstrap.database_path));

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            day_plans: DayPlanService::new(repository, scheduler),
            calendar_client,
            calendar_settings,
            timezone,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> CommandError {
        let code = error.code();
        match code {
            ErrorCode::Validation | ErrorCode::Overlap => {
                warn!(command, %code, %error, "command rejected");
            }
            _ => {
                error!(command, %code, %error, "command failed");
            }
        }
        let message = match code {
            ErrorCode::Internal => "Internal error".to_string(),
            _ => error.to_string(),
        };
        CommandError { code, message }
    }

    fn busy_time_service(&self) -> BusyTimeService<dyn GoogleCalendarClient> {
        BusyTimeService::new(
            Arc::clone(&self.calendar_client),
            self.calendar_settings.busy_calendar_ids.clone(),
        )
        .with_timezone(self.timezone)
        .with_retry_policy(RetryPolicy {
            max_attempts: self.calendar_settings.retry_max_attempts,
            base_delay_ms: self.calendar_settings.retry_base_delay_ms,
        })
    }
}

/// Wire form of a failed command: `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "Login required")
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveDayPlanRequest {
    #[serde(default)]
    pub blocks: Vec<BlockInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTaskRequest {
    pub task: TaskRequest,
    #[serde(default)]
    pub busy: Option<Vec<BusyEvent>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTaskResponse {
    pub date_key: String,
    pub block: Block,
    pub scheduled_after_last_block: bool,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDayPlanResponse {
    pub date_key: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarListResponse {
    pub calendars: Vec<GoogleCalendarSummary>,
}

pub fn get_day_plan_impl(
    state: &AppState,
    user_id: &str,
    date: Option<String>,
) -> Result<DayPlan, InfraError> {
    let date_key = required_date(date)?;
    state.day_plans.get(user_id, &date_key)
}

pub fn save_day_plan_impl(
    state: &AppState,
    user_id: &str,
    date: Option<String>,
    request: SaveDayPlanRequest,
) -> Result<DayPlan, InfraError> {
    let date_key = required_date(date)?;
    state.day_plans.save(user_id, &date_key, request.blocks)
}

pub fn delete_day_plan_impl(
    state: &AppState,
    user_id: &str,
    date: Option<String>,
) -> Result<DeleteDayPlanResponse, InfraError> {
    let date_key = required_date(date)?;
    let (date_key, deleted) = state.day_plans.delete(user_id, &date_key)?;
    Ok(DeleteDayPlanResponse { date_key, deleted })
}

/// Busy time for a placement: the caller's snapshot, else live calendars when a
/// token is given, else nothing.
pub async fn busy_snapshot_impl(
    state: &AppState,
    date: Option<String>,
    busy: Option<Vec<BusyEvent>>,
    calendar_token: Option<String>,
) -> Result<BusySnapshot, InfraError> {
    let date_key = required_date(date)?;
    let date = parse_date_key(&date_key)?;
    let busy_time = state.busy_time_service();

    Ok(match (busy, non_empty(calendar_token)) {
        (Some(events), _) => BusySnapshot {
            intervals: busy_time.convert_snapshot(&events, date),
            advisories: Vec::new(),
        },
        (None, Some(token)) => busy_time.busy_for_date(&token, date).await,
        (None, None) => BusySnapshot::default(),
    })
}

/// Proposes a placement for a task; the caller saves it with the rest of the plan.
pub fn propose_task_impl(
    state: &AppState,
    user_id: &str,
    date: Option<String>,
    task: &TaskRequest,
    busy: BusySnapshot,
) -> Result<ScheduleTaskResponse, InfraError> {
    let date_key = required_date(date)?;
    let (plan, placement) = state
        .day_plans
        .propose_task(user_id, &date_key, task, &busy.intervals)?;

    let mut advisories = busy.advisories;
    advisories.extend(placement.advisory());

    Ok(ScheduleTaskResponse {
        date_key: plan.date_key,
        scheduled_after_last_block: placement.scheduled_after_last_block(),
        block: placement.block,
        advisories,
    })
}

pub async fn list_calendars_impl(
    state: &AppState,
    calendar_token: Option<String>,
) -> Result<CalendarListResponse, InfraError> {
    let token = non_empty(calendar_token).ok_or_else(|| {
        PlanError::validation("A calendar access token is required (x-calendar-token header)")
    })?;
    let calendars = state.calendar_client.list_calendars(&token).await?;
    Ok(CalendarListResponse { calendars })
}

fn required_date(date: Option<String>) -> Result<String, PlanError> {
    non_empty(date).ok_or_else(|| PlanError::validation("Invalid date: expected ?date=YYYY-MM-DD"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
