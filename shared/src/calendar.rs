//! Google Calendar event listing and booking.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use validator::Validate;

use crate::credentials::CredentialStore;
use crate::oauth::TokenClient;
use crate::{Error, Result};

const GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Events returned per listing.
pub const LIST_PAGE_SIZE: u32 = 10;

/// Query for events inside `[timeMin, timeMax)`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListEventsQuery {
    #[serde(rename = "timeMin")]
    #[validate(required(message = "timeMin is required"))]
    pub time_min: Option<String>,
    #[serde(rename = "timeMax")]
    #[validate(required(message = "timeMax is required"))]
    pub time_max: Option<String>,
    #[serde(rename = "CALENDAR_ID", alias = "calendarId")]
    #[validate(
        required(message = "CALENDAR_ID is required"),
        length(min = 1, message = "CALENDAR_ID is required")
    )]
    pub calendar_id: Option<String>,
}

/// Event booking request.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct InsertEventRequest {
    #[validate(
        required(message = "summary is required"),
        length(min = 1, message = "summary is required")
    )]
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[validate(required(message = "start is required"))]
    pub start: Option<Value>,
    #[validate(required(message = "end is required"))]
    pub end: Option<Value>,
    pub attendees: Option<Vec<Value>>,
    #[serde(rename = "CALENDAR_ID", alias = "calendarId")]
    #[validate(
        required(message = "CALENDAR_ID is required"),
        length(min = 1, message = "CALENDAR_ID is required")
    )]
    pub calendar_id: Option<String>,
    #[serde(rename = "conferenceData")]
    pub conference_data: Option<Value>,
    #[serde(rename = "conferenceDataVersion")]
    pub conference_data_version: Option<u8>,
    #[serde(rename = "sendUpdates")]
    pub send_updates: Option<String>,
    /// Caller-supplied reminder policy; replaces the default when present.
    pub reminders: Option<Value>,
}

/// Turn validator output into a single message, every problem listed.
fn validation_error(errors: validator::ValidationErrors) -> Error {
    combined_error(validator_messages(&errors))
}

fn validator_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        })
        .collect()
}

fn combined_error(mut messages: Vec<String>) -> Error {
    messages.sort();
    messages.dedup();
    Error::Validation(messages.join(", "))
}

impl ListEventsQuery {
    pub fn validated(&self) -> Result<()> {
        self.validate().map_err(validation_error)
    }
}

/// An event time that is present but carries nothing: `null`, a blank
/// string or an empty object.
fn is_blank_time(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl InsertEventRequest {
    pub fn validated(&self) -> Result<()> {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => validator_messages(&errors),
        };

        for (name, value) in [("start", &self.start), ("end", &self.end)] {
            if value.as_ref().is_some_and(is_blank_time) {
                messages.push(format!("{} is required", name));
            }
        }
        if self.summary.as_deref().is_some_and(|s| s.trim().is_empty()) {
            messages.push("summary is required".to_string());
        }
        if self.calendar_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            messages.push("CALENDAR_ID is required".to_string());
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(combined_error(messages))
        }
    }

    /// Event resource sent to the provider.
    fn to_event_body(&self) -> EventBody {
        EventBody {
            summary: self.summary.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            start: self.start.clone().unwrap_or(Value::Null),
            end: self.end.clone().unwrap_or(Value::Null),
            attendees: self.attendees.clone().unwrap_or_default(),
            reminders: self.reminders.clone().unwrap_or_else(default_reminders),
            conference_data: self.conference_data.clone(),
        }
    }
}

/// 24-hour email plus 10-minute popup.
pub fn default_reminders() -> Value {
    serde_json::json!({
        "useDefault": false,
        "overrides": [
            { "method": "email", "minutes": 24 * 60 },
            { "method": "popup", "minutes": 10 }
        ]
    })
}

#[derive(Debug, Serialize)]
struct EventBody {
    summary: String,
    location: String,
    description: String,
    start: Value,
    end: Value,
    attendees: Vec<Value>,
    reminders: Value,
    #[serde(rename = "conferenceData", skip_serializing_if = "Option::is_none")]
    conference_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// Thin client for the Calendar v3 events API.
pub struct CalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CalendarClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(GOOGLE_CALENDAR_API_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// First page of single-occurrence events ordered by start time.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> Result<Vec<Value>> {
        let max_results = LIST_PAGE_SIZE.to_string();
        let response = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min),
                ("timeMax", time_max),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Calendar API error: HTTP {}: {}",
                status, error_text
            )));
        }

        let list: EventListResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse calendar response: {}", e)))?;

        Ok(list.items)
    }

    /// Create one event; returns the provider's event resource.
    pub async fn insert_event(&self, access_token: &str, request: &InsertEventRequest) -> Result<Value> {
        let calendar_id = request.calendar_id.as_deref().unwrap_or("primary");
        let conference_version = request.conference_data_version.unwrap_or(1).to_string();
        let send_updates = request.send_updates.as_deref().unwrap_or("none");

        let response = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&[
                ("conferenceDataVersion", conference_version.as_str()),
                ("sendUpdates", send_updates),
            ])
            .json(&request.to_event_body())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Calendar insert rejected: HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse inserted event: {}", e)))
    }
}

/// Refresh-credential → access-credential → calendar call, once per request.
pub struct CalendarService {
    credentials: Arc<dyn CredentialStore>,
    tokens: TokenClient,
    calendar: CalendarClient,
}

impl CalendarService {
    pub fn new(credentials: Arc<dyn CredentialStore>, tokens: TokenClient, calendar: CalendarClient) -> Self {
        Self {
            credentials,
            tokens,
            calendar,
        }
    }

    /// Fresh access token derived from the stored refresh token. Never retried.
    async fn access_token(&self) -> Result<String> {
        let refresh_token = self.credentials.refresh_token().await?.ok_or_else(|| {
            Error::UpstreamAuth("Calendar is not connected; visit /auth to authorize".to_string())
        })?;

        self.tokens.refresh_access_token(&refresh_token).await
    }

    pub async fn list_events(&self, query: &ListEventsQuery) -> Result<Vec<Value>> {
        query.validated()?;
        let (Some(calendar_id), Some(time_min), Some(time_max)) =
            (&query.calendar_id, &query.time_min, &query.time_max)
        else {
            return Err(Error::Validation("timeMin, timeMax and CALENDAR_ID are required".into()));
        };

        let access_token = self.access_token().await?;
        let events = self
            .calendar
            .list_events(&access_token, calendar_id, time_min, time_max)
            .await?;

        info!("Fetched {} events from calendar {}", events.len(), calendar_id);
        Ok(events)
    }

    pub async fn insert_event(&self, request: &InsertEventRequest) -> Result<Value> {
        request.validated()?;
        let access_token = self.access_token().await?;
        let event = self.calendar.insert_event(&access_token, request).await?;

        info!(
            "Created calendar event {}",
            event.get("id").and_then(|id| id.as_str()).unwrap_or("(unknown)")
        );
        Ok(event)
    }
}
