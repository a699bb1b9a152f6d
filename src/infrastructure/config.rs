use crate::domain::models::parse_hhmm_minutes;
use crate::domain::placement::PlacementPolicy;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const CALENDARS_JSON: &str = "calendars.json";
const POLICIES_JSON: &str = "policies.json";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_RETRY_MAX_ATTEMPTS: u8 = 2;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSettings {
    pub busy_calendar_ids: Vec<String>,
    pub api_base_url: Option<String>,
    pub request_timeout: Duration,
    pub retry_max_attempts: u8,
    pub retry_base_delay_ms: u64,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayPlan",
                "timezone": null,
                "server": {
                    "host": DEFAULT_HOST,
                    "port": DEFAULT_PORT
                }
            }),
        ),
        (
            CALENDARS_JSON,
            serde_json::json!({
                "schema": 1,
                "busyCalendarIds": ["primary"],
                "apiBaseUrl": null,
                "requestTimeoutSeconds": DEFAULT_REQUEST_TIMEOUT_SECONDS,
                "retry": {
                    "maxAttempts": DEFAULT_RETRY_MAX_ATTEMPTS,
                    "baseDelayMs": DEFAULT_RETRY_BASE_DELAY_MS
                }
            }),
        ),
        (
            POLICIES_JSON,
            serde_json::json!({
                "schema": 1,
                "workHours": {
                    "start": "09:00",
                    "end": "18:00"
                },
                "bufferMinutes": 10,
                "defaultTaskDurationMinutes": 30
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// Checks that every config file parses and carries a supported schema.
pub fn validate_configs(config_dir: &Path) -> Result<(), InfraError> {
    for name in [APP_JSON, CALENDARS_JSON, POLICIES_JSON] {
        read_config(&config_dir.join(name))?;
    }
    Ok(())
}

fn non_empty_str<'a>(value: Option<&'a serde_json::Value>) -> Option<&'a str> {
    value
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The configured IANA zone, or `None` to read timestamps in their own offset.
pub fn read_timezone(config_dir: &Path) -> Result<Option<Tz>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let Some(name) = non_empty_str(app.get("timezone")) else {
        return Ok(None);
    };
    name.parse::<Tz>()
        .map(Some)
        .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone '{name}' in {APP_JSON}")))
}

fn busy_calendar_ids_from(calendars: &serde_json::Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in calendars
        .get("busyCalendarIds")
        .and_then(serde_json::Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

pub fn read_calendar_settings(config_dir: &Path) -> Result<CalendarSettings, InfraError> {
    let calendars = read_config(&config_dir.join(CALENDARS_JSON))?;
    let retry = calendars.get("retry");

    let retry_max_attempts = match retry
        .and_then(|retry| retry.get("maxAttempts"))
        .and_then(serde_json::Value::as_u64)
    {
        Some(value) => u8::try_from(value).map_err(|_| {
            InfraError::InvalidConfig(format!(
                "retry.maxAttempts must be at most {} in {CALENDARS_JSON}",
                u8::MAX
            ))
        })?,
        None => DEFAULT_RETRY_MAX_ATTEMPTS,
    };

    Ok(CalendarSettings {
        busy_calendar_ids: busy_calendar_ids_from(&calendars),
        api_base_url: non_empty_str(calendars.get("apiBaseUrl")).map(ToOwned::to_owned),
        request_timeout: Duration::from_secs(
            calendars
                .get("requestTimeoutSeconds")
                .and_then(serde_json::Value::as_u64)
                .filter(|seconds| *seconds > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        ),
        retry_max_attempts,
        retry_base_delay_ms: retry
            .and_then(|retry| retry.get("baseDelayMs"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
    })
}

pub fn read_placement_policy(config_dir: &Path) -> Result<PlacementPolicy, InfraError> {
    let policies = read_config(&config_dir.join(POLICIES_JSON))?;
    let defaults = PlacementPolicy::default();
    let work_hours = policies.get("workHours");

    let work_start_min =
        read_hhmm(work_hours.and_then(|hours| hours.get("start")), "workHours.start")?
            .unwrap_or(defaults.work_start_min);
    let work_end_min = read_hhmm(work_hours.and_then(|hours| hours.get("end")), "workHours.end")?
        .unwrap_or(defaults.work_end_min);

    let policy = PlacementPolicy {
        work_start_min,
        work_end_min,
        buffer_min: read_minutes(policies.get("bufferMinutes"), "bufferMinutes")?
            .unwrap_or(defaults.buffer_min),
        default_duration_min: read_minutes(
            policies.get("defaultTaskDurationMinutes"),
            "defaultTaskDurationMinutes",
        )?
        .unwrap_or(defaults.default_duration_min),
    };
    policy
        .validate()
        .map_err(|message| {
            InfraError::InvalidConfig(format!("{message} in {POLICIES_JSON}"))
        })?;
    Ok(policy)
}

fn read_hhmm(
    value: Option<&serde_json::Value>,
    field_name: &str,
) -> Result<Option<u32>, InfraError> {
    let Some(raw) = non_empty_str(value) else {
        return Ok(None);
    };
    parse_hhmm_minutes(raw).map(Some).ok_or_else(|| {
        InfraError::InvalidConfig(format!("{field_name} must be HH:MM, got '{raw}'"))
    })
}

fn read_minutes(
    value: Option<&serde_json::Value>,
    field_name: &str,
) -> Result<Option<u32>, InfraError> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return Ok(None);
    };
    value
        .as_u64()
        .and_then(|minutes| u32::try_from(minutes).ok())
        .map(Some)
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!("{field_name} must be a non-negative integer"))
        })
}

/// Listener address from `app.json`, overridden by environment values from `lookup`.
pub fn load_server_address_from_lookup<F>(
    config_dir: &Path,
    lookup: F,
) -> Result<ServerAddress, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;
    let server = app.get("server");

    let host = optional_lookup_value(&lookup, &["DAYPLAN_HOST"])
        .or_else(|| {
            non_empty_str(server.and_then(|server| server.get("host"))).map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match optional_lookup_value(&lookup, &["DAYPLAN_PORT", "PORT"]) {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            InfraError::InvalidConfig(format!("invalid listener port '{raw}'"))
        })?,
        None => match server
            .and_then(|server| server.get("port"))
            .and_then(serde_json::Value::as_u64)
        {
            Some(port) => u16::try_from(port).map_err(|_| {
                InfraError::InvalidConfig(format!("server.port {port} is out of range"))
            })?,
            None => DEFAULT_PORT,
        },
    };

    Ok(ServerAddress { host, port })
}

pub fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
