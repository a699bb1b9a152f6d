use crate::domain::error::PlanError;
use crate::domain::interval::Interval;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MINUTES_PER_DAY: u32 = 1440;
pub const MAX_START_MIN: u32 = 1439;
pub const MIN_DURATION_MIN: u32 = 5;
pub const MAX_DURATION_MIN: u32 = 600;
pub const MAX_TITLE_CHARS: usize = 120;
pub const DEFAULT_DURATION_MIN: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    #[default]
    Manual,
    Task,
}

impl BlockSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockSource::Manual => "manual",
            BlockSource::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(BlockSource::Manual),
            "task" => Some(BlockSource::Task),
            _ => None,
        }
    }
}

/// A placed, normalized unit of time on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub title: String,
    pub start_min: u32,
    pub duration_min: u32,
    pub source: BlockSource,
    pub task_id: Option<String>,
    pub locked: bool,
}

impl Block {
    pub fn end_min(&self) -> u32 {
        self.start_min.saturating_add(self.duration_min)
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.start_min, self.end_min())
    }
}

/// A block as it arrives from a client: every field optional, numbers unchecked.
///
/// Minute fields also accept numeric strings and `locked` accepts any
/// truthy value, so form-encoded clients round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub start_min: Option<i64>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub locked: Option<bool>,
}

impl From<Block> for BlockInput {
    fn from(block: Block) -> Self {
        Self {
            id: Some(block.id),
            title: Some(block.title),
            start_min: Some(i64::from(block.start_min)),
            duration_min: Some(i64::from(block.duration_min)),
            source: Some(block.source.as_str().to_string()),
            task_id: block.task_id,
            locked: Some(block.locked),
        }
    }
}

/// A backlog task to be placed on a day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date_key: String,
    pub blocks: Vec<Block>,
}

impl DayPlan {
    pub fn empty(date_key: impl Into<String>) -> Self {
        Self {
            date_key: date_key.into(),
            blocks: Vec::new(),
        }
    }
}

pub fn parse_date_key(value: &str) -> Result<NaiveDate, PlanError> {
    let value = value.trim();
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 4 || index == 7 || byte.is_ascii_digit());
    if !well_formed {
        return Err(PlanError::validation(format!(
            "Invalid date '{value}': expected YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PlanError::validation(format!("Invalid date '{value}': not a calendar day")))
}

/// Parses `HH:MM` into minutes after midnight. `24:00` is accepted as the end of day.
pub fn parse_hhmm_minutes(value: &str) -> Option<u32> {
    let value = value.trim();
    if value == "24:00" {
        return Some(MINUTES_PER_DAY);
    }
    let time = NaiveTime::parse_from_str(value, "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}

pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn truncate_title(value: &str) -> String {
    value
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Keeps task references that look like opaque identifiers and drops everything else.
pub fn coerce_task_id(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let valid = value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| value.to_string())
}

fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let minutes = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < 1e15)
                .map(|float| float as i64)
        }),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                Some(0)
            } else {
                raw.parse::<i64>().ok()
            }
        }
        Some(Value::Bool(flag)) => Some(i64::from(flag)),
        Some(_) => None,
    };
    minutes
        .map(Some)
        .ok_or_else(|| D::Error::custom("expected a whole number of minutes"))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(flag),
        Some(Value::Number(number)) => Some(number.as_f64().is_some_and(|n| n != 0.0)),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            Some(!(raw.is_empty() || raw == "0" || raw.eq_ignore_ascii_case("false")))
        }
        Some(Value::Array(_) | Value::Object(_)) => Some(true),
    })
}
