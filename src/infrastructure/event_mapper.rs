use crate::domain::interval::Interval;
use crate::domain::models::{MINUTES_PER_DAY, parse_date_key};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const MISSING_END_MINUTES: i64 = 30;
const MIN_BUSY_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl CalendarEventDateTime {
    fn value(&self) -> Option<&str> {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<CalendarEventDateTime>,
    #[serde(default)]
    pub end: Option<CalendarEventDateTime>,
}

/// Busy time as a client or calendar reports it: RFC 3339 timestamps or a
/// `YYYY-MM-DD` all-day marker in `start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyEvent {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

pub fn to_busy_event(event: &GoogleCalendarEvent) -> Option<BusyEvent> {
    if event
        .status
        .as_deref()
        .is_some_and(|status| status.eq_ignore_ascii_case("cancelled"))
    {
        return None;
    }
    let start = event.start.as_ref()?.value()?.to_string();
    let end = event
        .end
        .as_ref()
        .and_then(CalendarEventDateTime::value)
        .map(ToOwned::to_owned);
    Some(BusyEvent { start, end })
}

/// Minutes of `date` covered by `event`, read in `timezone` or the timestamp's own offset.
pub fn busy_event_to_interval(
    event: &BusyEvent,
    date: NaiveDate,
    timezone: Option<Tz>,
) -> Option<Interval> {
    if let Ok(first_day) = parse_date_key(&event.start) {
        return all_day_interval(first_day, event.end.as_deref(), date);
    }

    let midnight = date.and_hms_opt(0, 0, 0)?;
    let start_min = minutes_since(midnight, parse_local_timestamp(&event.start, timezone)?);
    let end_min = event
        .end
        .as_deref()
        .and_then(|end| parse_local_timestamp(end, timezone))
        .map(|end| minutes_since(midnight, end))
        .unwrap_or(start_min + MISSING_END_MINUTES)
        .max(start_min + MIN_BUSY_MINUTES);

    let day = i64::from(MINUTES_PER_DAY);
    if end_min <= 0 || start_min >= day {
        return None;
    }
    let start = u32::try_from(start_min.clamp(0, day)).ok()?;
    let end = u32::try_from(end_min.clamp(0, day)).ok()?;
    Some(Interval::new(start, end))
}

pub fn busy_intervals(
    events: &[BusyEvent],
    date: NaiveDate,
    timezone: Option<Tz>,
) -> Vec<Interval> {
    events
        .iter()
        .filter_map(|event| busy_event_to_interval(event, date, timezone))
        .collect()
}

// All-day ends are exclusive dates; a missing or unreadable end covers one day.
fn all_day_interval(first_day: NaiveDate, end: Option<&str>, date: NaiveDate) -> Option<Interval> {
    let last_exclusive = end
        .and_then(|end| parse_date_key(end).ok())
        .filter(|end| *end > first_day)
        .or_else(|| first_day.checked_add_days(Days::new(1)))?;
    (first_day <= date && date < last_exclusive).then(|| Interval::new(0, MINUTES_PER_DAY))
}

fn parse_local_timestamp(value: &str, timezone: Option<Tz>) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(match timezone {
            Some(timezone) => parsed.with_timezone(&timezone).naive_local(),
            None => parsed.naive_local(),
        });
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn minutes_since(midnight: NaiveDateTime, instant: NaiveDateTime) -> i64 {
    (instant - midnight).num_seconds().div_euclid(60)
}
