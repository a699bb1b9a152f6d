use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const PAGE_SIZE: &str = "250";
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarSummary {
    pub id: String,
    pub summary: String,
    pub primary: bool,
    pub access_role: Option<String>,
}

/// Read-only view of a calendar provider, enough to derive busy time.
#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<GoogleCalendarSummary>, InfraError>;

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    api_base: Url,
}

impl ReqwestGoogleCalendarClient {
    pub fn new(api_base: Option<&str>, request_timeout: Duration) -> Result<Self, InfraError> {
        let raw_base = api_base
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_API_BASE);
        let api_base = Url::parse(raw_base).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid calendar api base url '{raw_base}': {error}"
            ))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "calendar api base url '{raw_base}' cannot be a base"
            )));
        }
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| {
                InfraError::Calendar(format!("failed to build http client: {error}"))
            })?;
        Ok(Self { client, api_base })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(action: &str, status: reqwest::StatusCode, body: &str) -> InfraError {
        warn!(action, status = status.as_u16(), body, "google calendar api rejected request");
        InfraError::Calendar(format!("google calendar api error: http {}", status.as_u16()))
    }

    fn ensure_page_budget(pages: usize, action: &str) -> Result<(), InfraError> {
        if pages >= MAX_PAGES {
            return Err(InfraError::Calendar(format!(
                "too many pages while {action} (limit {MAX_PAGES})"
            )));
        }
        Ok(())
    }

    fn transport_error(action: &str, error: reqwest::Error) -> InfraError {
        if error.is_timeout() {
            InfraError::Calendar(format!("timeout while {action}: {error}"))
        } else {
            InfraError::Calendar(format!("network error while {action}: {error}"))
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.api_base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("calendar api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| Self::transport_error(action, error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Self::transport_error(action, error))?;

        if !status.is_success() {
            return Err(Self::http_error(action, status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            debug!(action, body = body.as_str(), "unparseable google calendar payload");
            InfraError::Calendar(format!("invalid payload while {action}: {error}"))
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListPage {
    items: Option<Vec<CalendarListItem>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListItem {
    id: String,
    summary: Option<String>,
    #[serde(default)]
    primary: bool,
    #[serde(rename = "accessRole")]
    access_role: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct EventsPage {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<GoogleCalendarSummary>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&["users", "me", "calendarList"])?;
        let mut page_token: Option<String> = None;
        let mut calendars = Vec::new();

        for pages in 0.. {
            Self::ensure_page_budget(pages, "listing calendars")?;
            let mut request = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(page_token) = page_token.as_deref() {
                request = request.query(&[("pageToken", page_token)]);
            }

            let page: CalendarListPage = self.get_json(request, "listing calendars").await?;
            calendars.extend(page.items.unwrap_or_default().into_iter().filter_map(|item| {
                let id = item.id.trim();
                if id.is_empty() {
                    return None;
                }
                let summary = item
                    .summary
                    .map(|summary| summary.trim().to_string())
                    .filter(|summary| !summary.is_empty())
                    .unwrap_or_else(|| id.to_string());
                Some(GoogleCalendarSummary {
                    id: id.to_string(),
                    summary,
                    primary: item.primary,
                    access_role: item.access_role,
                })
            }));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(calendars)
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = self.endpoint(&["calendars", calendar_id.trim(), "events"])?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        for pages in 0.. {
            Self::ensure_page_budget(pages, "listing calendar events")?;
            let mut request = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", PAGE_SIZE),
                ])
                .query(&[
                    ("timeMin", time_min.to_rfc3339()),
                    ("timeMax", time_max.to_rfc3339()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                request = request.query(&[("pageToken", page_token)]);
            }

            let page: EventsPage = self.get_json(request, "listing calendar events").await?;
            events.extend(page.items.unwrap_or_default());

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(events)
    }
}
