//! Calendar Events Lambda - Reads and books events on the connected calendar.
//!
//! Endpoints:
//! - GET /getCalendarEvents?timeMin=&timeMax=&CALENDAR_ID= - List up to 10 events
//! - POST /getCalendarEvents - Insert an event (JSON body)
//!
//! Every request exchanges the stored refresh token for a fresh access token.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde_json::Value;
use shared::http::{error_response, parse_json_body, preflight_response, query_param, reply, route_path};
use shared::{
    CalendarClient, CalendarService, DbSettings, InsertEventRequest, ListEventsQuery,
    PgCredentialStore, TokenClient,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct AppState {
    calendar: CalendarService,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = shared::Config::from_env()?;
        let credentials = shared::secrets::google_oauth_credentials(&config.google).await?;

        let store = Arc::new(PgCredentialStore::new(DbSettings::from(&config)));
        let calendar = CalendarService::new(
            store,
            TokenClient::new(credentials)?,
            CalendarClient::new()?,
        );

        Ok(Self { calendar })
    }

    async fn list(&self, event: &Request) -> shared::Result<Vec<Value>> {
        let query = ListEventsQuery {
            time_min: query_param(event, "timeMin"),
            time_max: query_param(event, "timeMax"),
            calendar_id: query_param(event, "CALENDAR_ID").or_else(|| query_param(event, "calendarId")),
        };
        self.calendar.list_events(&query).await
    }

    async fn insert(&self, event: &Request) -> shared::Result<Value> {
        let request: InsertEventRequest = parse_json_body(event.body())?;
        self.calendar.insert_event(&request).await
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = route_path(&event);
    let method = event.method().as_str();

    match (method, path.as_str()) {
        ("OPTIONS", _) => preflight_response(),
        ("GET", "/getCalendarEvents") => {
            reply(200, "Events retrieved successfully", state.list(&event).await)
        }
        ("POST", "/getCalendarEvents") => {
            reply(201, "Event created successfully", state.insert(&event).await)
        }
        (_, "/getCalendarEvents") => error_response(&shared::Error::MethodNotAllowed),
        _ => error_response(&shared::Error::NotFound(format!("No route for {}", path))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::RequestExt;
    use shared::memory::MemoryCredentialStore;
    use shared::OAuthCredentials;
    use std::collections::HashMap;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param as has_query};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(server: &MockServer, store: MemoryCredentialStore) -> Arc<AppState> {
        let tokens = TokenClient::with_endpoints(
            OAuthCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                redirect_uri: "https://cms.example.com/api/auth".into(),
            },
            "https://accounts.example.com/auth",
            format!("{}/token", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let calendar = CalendarClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        Arc::new(AppState {
            calendar: CalendarService::new(Arc::new(store), tokens, calendar),
        })
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "at"})),
            )
            .mount(server)
            .await;
    }

    fn get(query: &[(&str, &str)]) -> Request {
        let params: HashMap<String, String> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lambda_http::http::Request::builder()
            .method("GET")
            .uri("/api/getCalendarEvents")
            .body(Body::Empty)
            .unwrap()
            .with_query_string_parameters(params)
    }

    fn post(body: Value) -> Request {
        lambda_http::http::Request::builder()
            .method("POST")
            .uri("/getCalendarEvents")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_list_events() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(has_query("timeMin", "2024-03-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "a"}, {"id": "b"}]
            })))
            .mount(&server)
            .await;

        let response = handler(
            state(&server, MemoryCredentialStore::with_token("rt")),
            get(&[
                ("timeMin", "2024-03-01T00:00:00Z"),
                ("timeMax", "2024-03-08T00:00:00Z"),
                ("calendarId", "primary"),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_time_max_is_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let response = handler(
            state(&server, MemoryCredentialStore::with_token("rt")),
            get(&[("timeMin", "2024-03-01T00:00:00Z"), ("CALENDAR_ID", "primary")]),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        let body = body_json(&response);
        assert_eq!(body["kind"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("timeMax"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_upstream_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = handler(
            state(&server, MemoryCredentialStore::with_token("revoked")),
            get(&[
                ("timeMin", "2024-03-01T00:00:00Z"),
                ("timeMax", "2024-03-08T00:00:00Z"),
                ("CALENDAR_ID", "primary"),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(body_json(&response)["kind"], "upstream_auth_error");
    }

    #[tokio::test]
    async fn test_insert_event_with_default_reminders() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(has_query("sendUpdates", "none"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Consultation",
                "reminders": {"useDefault": false}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "evt-9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = handler(
            state(&server, MemoryCredentialStore::with_token("rt")),
            post(serde_json::json!({
                "summary": "Consultation",
                "start": {"dateTime": "2024-03-02T10:00:00Z"},
                "end": {"dateTime": "2024-03-02T11:00:00Z"},
                "CALENDAR_ID": "primary"
            })),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(body_json(&response)["data"]["id"], "evt-9");
    }

    #[tokio::test]
    async fn test_insert_without_summary_is_400() {
        let server = MockServer::start().await;
        let response = handler(
            state(&server, MemoryCredentialStore::with_token("rt")),
            post(serde_json::json!({"CALENDAR_ID": "primary"})),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_delete_not_allowed() {
        let server = MockServer::start().await;
        let request = lambda_http::http::Request::builder()
            .method("DELETE")
            .uri("/getCalendarEvents")
            .body(Body::Empty)
            .unwrap();
        let response = handler(state(&server, MemoryCredentialStore::default()), request)
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
    }
}
