use crate::domain::error::Advisory;
use crate::domain::interval::Interval;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{
    BusyEvent, GoogleCalendarEvent, busy_intervals, to_busy_event,
};
use crate::infrastructure::google_calendar_client::GoogleCalendarClient;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::{debug, warn};

// Widest UTC offsets in use; events are filtered to the plan date after conversion.
const FETCH_MARGIN_HOURS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusySnapshot {
    pub intervals: Vec<Interval>,
    pub advisories: Vec<Advisory>,
}

/// Collects busy time for one date across the configured calendars.
///
/// A calendar that keeps failing after retries is left out and reported as an
/// `UPSTREAM_UNAVAILABLE` advisory; it never fails the caller.
pub struct BusyTimeService<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    calendar_client: Arc<C>,
    calendar_ids: Vec<String>,
    timezone: Option<Tz>,
    retry_policy: RetryPolicy,
}

impl<C> BusyTimeService<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    pub fn new(calendar_client: Arc<C>, calendar_ids: Vec<String>) -> Self {
        Self {
            calendar_client,
            calendar_ids,
            timezone: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    pub async fn busy_for_date(&self, access_token: &str, date: NaiveDate) -> BusySnapshot {
        let (time_min, time_max) = fetch_window(date);
        let mut events: Vec<BusyEvent> = Vec::new();
        let mut advisories = Vec::new();

        for calendar_id in &self.calendar_ids {
            match self
                .list_events_with_retry(access_token, calendar_id, time_min, time_max)
                .await
            {
                Ok(fetched) => {
                    debug!(
                        calendar_id = calendar_id.as_str(),
                        events = fetched.len(),
                        "fetched busy events"
                    );
                    events.extend(fetched.iter().filter_map(to_busy_event));
                }
                Err(error) => {
                    warn!(
                        calendar_id = calendar_id.as_str(),
                        %error,
                        "calendar unavailable; planning without it"
                    );
                    advisories.push(Advisory::upstream_unavailable(format!(
                        "Calendar '{calendar_id}' is unavailable; busy time from it was ignored."
                    )));
                }
            }
        }

        BusySnapshot {
            intervals: busy_intervals(&events, date, self.timezone),
            advisories,
        }
    }

    pub fn convert_snapshot(&self, events: &[BusyEvent], date: NaiveDate) -> Vec<Interval> {
        busy_intervals(events, date, self.timezone)
    }

    async fn list_events_with_retry(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self
                .calendar_client
                .list_events(access_token, calendar_id, time_min, time_max)
                .await
            {
                Ok(events) => return Ok(events),
                Err(error) if should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(u32::from(attempt)));
                    debug!(calendar_id, attempt, delay, %error, "retrying calendar fetch");
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn should_retry(error: &InfraError) -> bool {
    match error {
        InfraError::Calendar(message) => {
            let message = message.to_ascii_lowercase();
            message.contains("network error")
                || message.contains("timeout")
                || message.contains("timed out")
                || message.contains("http 429")
                || message.contains("http 503")
                || message.contains("connection reset")
        }
        _ => false,
    }
}

fn fetch_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let margin = Duration::hours(FETCH_MARGIN_HOURS);
    (midnight - margin, midnight + Duration::days(1) + margin)
}
