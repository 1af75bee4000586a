//! Calendar operations behind the gateway's calendar target.
//!
//! Every operation returns a JSON outcome with a `success` flag. Bad
//! parameters, missing consent and upstream failures are all reported in
//! that outcome so the model can read them and adapt.

pub mod google;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use self::google::{GoogleCalendarClient, ListQuery};
use crate::config::CalendarConfig;
use crate::error::{CalendarError, IdentityError};
use crate::gateway::unqualify_tool_name;
use crate::identity::{AccessToken, AccessTokenSource};
use crate::tool::{catalog, failure};
use crate::types::CallerIdentity;

/// User id used when the gateway did not pass one.
pub const DEFAULT_USER_ID: &str = "default-user";

/// Google rejects larger pages.
const MAX_RESULTS_LIMIT: u64 = 2500;

/// Event payload of the calendar target.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRequest {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// The supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Accepts the short form, the catalog tool name or a gateway-qualified name.
    pub fn parse(raw: &str) -> Option<Self> {
        match unqualify_tool_name(raw) {
            "list" | catalog::LIST_EVENTS => Some(Operation::List),
            "create" | catalog::CREATE_EVENT => Some(Operation::Create),
            "update" | catalog::UPDATE_EVENT => Some(Operation::Update),
            "delete" | catalog::DELETE_EVENT => Some(Operation::Delete),
            _ => None,
        }
    }
}

enum Failure {
    Invalid(String),
    Consent { authorization_url: String },
    Identity(IdentityError),
    Calendar(CalendarError),
}

impl From<CalendarError> for Failure {
    fn from(e: CalendarError) -> Self {
        Failure::Calendar(e)
    }
}

impl Failure {
    fn into_value(self) -> Value {
        match self {
            Failure::Invalid(msg) => failure(msg),
            Failure::Consent { authorization_url } => json!({
                "success": false,
                "error": "Google Calendar authorization is required. Open the authorization URL and try again.",
                "authorization_url": authorization_url,
            }),
            Failure::Identity(e) => {
                error!("Failed to get Google access token: {}", e);
                failure(format!("Failed to get access token: {e}"))
            }
            Failure::Calendar(e) => {
                warn!("{}", e);
                failure(e.to_string())
            }
        }
    }
}

/// Executes calendar operations for a caller.
pub struct CalendarService {
    client: GoogleCalendarClient,
    tokens: Arc<dyn AccessTokenSource>,
    time_zone: String,
    default_max_results: u32,
}

impl CalendarService {
    pub fn new(client: GoogleCalendarClient, tokens: Arc<dyn AccessTokenSource>, config: &CalendarConfig) -> Self {
        Self {
            client,
            tokens,
            time_zone: config.time_zone.clone(),
            default_max_results: config.default_max_results,
        }
    }

    /// Dispatch `{operation, parameters}`.
    ///
    /// The caller is read from the reserved `user_id` and `user_token`
    /// parameters that the tool proxy injects.
    pub async fn handle(&self, request: CalendarRequest) -> Value {
        let Some(operation) = Operation::parse(&request.operation) else {
            return failure(format!("Unknown operation: {}", request.operation));
        };

        let params = &request.parameters;
        let caller = CallerIdentity::new(
            params
                .get("user_id")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_USER_ID),
            params
                .get("user_token")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        );
        info!("Calendar {:?} for user {}", operation, caller.user_id);

        let result = match operation {
            Operation::List => self.list_events(&caller, params).await,
            Operation::Create => self.create_event(&caller, params).await,
            Operation::Update => self.update_event(&caller, params).await,
            Operation::Delete => self.delete_event(&caller, params).await,
        };
        result.unwrap_or_else(Failure::into_value)
    }

    async fn token(&self, caller: &CallerIdentity) -> Result<String, Failure> {
        match self.tokens.access_token(caller).await {
            Ok(AccessToken::Granted(token)) => Ok(token),
            Ok(AccessToken::ConsentRequired { authorization_url }) => {
                Err(Failure::Consent { authorization_url })
            }
            Err(e) => Err(Failure::Identity(e)),
        }
    }

    fn event_time(&self, date_time: &str) -> Value {
        json!({"dateTime": date_time, "timeZone": self.time_zone})
    }

    async fn list_events(&self, caller: &CallerIdentity, params: &Map<String, Value>) -> Result<Value, Failure> {
        let query = ListQuery {
            time_min: optional_datetime(params, "time_min")?,
            time_max: optional_datetime(params, "time_max")?,
            max_results: max_results(params, self.default_max_results)?,
        };

        let token = self.token(caller).await?;
        let events = self.client.list_events(&token, &query).await?;
        Ok(json!({
            "success": true,
            "count": events.len(),
            "events": events,
        }))
    }

    async fn create_event(&self, caller: &CallerIdentity, params: &Map<String, Value>) -> Result<Value, Failure> {
        let summary = required_str(params, "summary")?;
        let start_time = required_datetime(params, "start_time")?;
        let end_time = required_datetime(params, "end_time")?;
        check_order(&start_time, &end_time)?;

        let mut event = json!({
            "summary": summary,
            "start": self.event_time(&start_time),
            "end": self.event_time(&end_time),
        });
        if let Some(description) = optional_str(params, "description")?.filter(|s| !s.is_empty()) {
            event["description"] = json!(description);
        }
        if let Some(location) = optional_str(params, "location")?.filter(|s| !s.is_empty()) {
            event["location"] = json!(location);
        }

        let token = self.token(caller).await?;
        let created = self.client.insert_event(&token, &event).await?;
        let event_id = created.get("id").cloned().unwrap_or(Value::Null);
        Ok(json!({
            "success": true,
            "event": created,
            "event_id": event_id,
        }))
    }

    async fn update_event(&self, caller: &CallerIdentity, params: &Map<String, Value>) -> Result<Value, Failure> {
        let event_id = required_str(params, "event_id")?;
        let summary = optional_str(params, "summary")?;
        let start_time = optional_datetime(params, "start_time")?;
        let end_time = optional_datetime(params, "end_time")?;
        let description = optional_str(params, "description")?;
        let location = optional_str(params, "location")?;
        if let (Some(start), Some(end)) = (&start_time, &end_time) {
            check_order(start, end)?;
        }
        if summary.is_none()
            && start_time.is_none()
            && end_time.is_none()
            && description.is_none()
            && location.is_none()
        {
            return Err(Failure::Invalid("No fields to update were given".to_string()));
        }

        let token = self.token(caller).await?;
        let mut event = self.client.get_event(&token, &event_id).await?;
        if let Some(v) = summary {
            event["summary"] = json!(v);
        }
        if let Some(v) = start_time {
            event["start"] = self.event_time(&v);
        }
        if let Some(v) = end_time {
            event["end"] = self.event_time(&v);
        }
        if let Some(v) = description {
            event["description"] = json!(v);
        }
        if let Some(v) = location {
            event["location"] = json!(v);
        }

        let updated = self.client.update_event(&token, &event_id, &event).await?;
        Ok(json!({
            "success": true,
            "event": updated,
        }))
    }

    async fn delete_event(&self, caller: &CallerIdentity, params: &Map<String, Value>) -> Result<Value, Failure> {
        let event_id = required_str(params, "event_id")?;

        let token = self.token(caller).await?;
        self.client.delete_event(&token, &event_id).await?;
        Ok(json!({
            "success": true,
            "message": format!("Event {event_id} deleted successfully"),
        }))
    }
}

// ====== Parameter validation ======

fn optional_str(params: &Map<String, Value>, key: &str) -> Result<Option<String>, Failure> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Failure::Invalid(format!("{key} must be a string"))),
    }
}

fn required_str(params: &Map<String, Value>, key: &str) -> Result<String, Failure> {
    match optional_str(params, key)? {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(Failure::Invalid(format!("{key} is required"))),
    }
}

fn validate_datetime(key: &str, value: String) -> Result<String, Failure> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|_| value.clone())
        .map_err(|_| {
            Failure::Invalid(format!(
                "{key} must be an ISO-8601 datetime with offset (e.g. 2025-01-15T14:00:00+09:00), got '{value}'"
            ))
        })
}

fn optional_datetime(params: &Map<String, Value>, key: &str) -> Result<Option<String>, Failure> {
    optional_str(params, key)?
        .map(|v| validate_datetime(key, v))
        .transpose()
}

fn required_datetime(params: &Map<String, Value>, key: &str) -> Result<String, Failure> {
    validate_datetime(key, required_str(params, key)?)
}

fn check_order(start: &str, end: &str) -> Result<(), Failure> {
    let parse = |s: &str| chrono::DateTime::parse_from_rfc3339(s).ok();
    match (parse(start), parse(end)) {
        (Some(s), Some(e)) if e <= s => Err(Failure::Invalid(
            "end_time must be after start_time".to_string(),
        )),
        _ => Ok(()),
    }
}

fn max_results(params: &Map<String, Value>, default: u32) -> Result<u32, Failure> {
    match params.get("max_results") {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .filter(|n| (1..=MAX_RESULTS_LIMIT).contains(n))
            .map(|n| n as u32)
            .ok_or_else(|| {
                Failure::Invalid(format!(
                    "max_results must be an integer between 1 and {MAX_RESULTS_LIMIT}"
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedTokens {
        outcome: AccessToken,
        callers: Mutex<Vec<CallerIdentity>>,
    }

    impl FixedTokens {
        fn granted() -> Arc<Self> {
            Arc::new(Self {
                outcome: AccessToken::Granted("ya29".into()),
                callers: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AccessTokenSource for FixedTokens {
        async fn access_token(&self, caller: &CallerIdentity) -> Result<AccessToken, IdentityError> {
            self.callers.lock().unwrap().push(caller.clone());
            Ok(self.outcome.clone())
        }
    }

    fn service(server: &MockServer, tokens: Arc<FixedTokens>) -> CalendarService {
        let config = CalendarConfig {
            api_base: server.uri(),
            ..Default::default()
        };
        CalendarService::new(GoogleCalendarClient::new(Client::new(), &config), tokens, &config)
    }

    fn request(operation: &str, parameters: Value) -> CalendarRequest {
        serde_json::from_value(json!({"operation": operation, "parameters": parameters})).unwrap()
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("list"), Some(Operation::List));
        assert_eq!(Operation::parse("create_calendar_event"), Some(Operation::Create));
        assert_eq!(Operation::parse("calendar___delete_calendar_event"), Some(Operation::Delete));
        assert_eq!(Operation::parse("rename"), None);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let server = MockServer::start().await;
        let out = service(&server, FixedTokens::granted())
            .handle(request("rename", json!({})))
            .await;
        assert_eq!(out, json!({"success": false, "error": "Unknown operation: rename"}));
    }

    #[tokio::test]
    async fn test_create_missing_start_time_makes_no_calls() {
        let server = MockServer::start().await;
        let tokens = FixedTokens::granted();
        let out = service(&server, tokens.clone())
            .handle(request(
                "create",
                json!({"summary": "会議", "end_time": "2025-01-15T15:00:00+09:00"}),
            ))
            .await;

        assert_eq!(out, json!({"success": false, "error": "start_time is required"}));
        assert!(tokens.callers.lock().unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_naive_datetime() {
        let server = MockServer::start().await;
        let out = service(&server, FixedTokens::granted())
            .handle(request(
                "create",
                json!({
                    "summary": "会議",
                    "start_time": "2025-01-15 14:00",
                    "end_time": "2025-01-15T15:00:00+09:00"
                }),
            ))
            .await;
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().starts_with("start_time must be an ISO-8601"));
    }

    #[tokio::test]
    async fn test_create_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_partial_json(json!({
                "summary": "会議",
                "start": {"dateTime": "2025-01-15T14:00:00+09:00", "timeZone": "Asia/Tokyo"},
                "end": {"dateTime": "2025-01-15T15:00:00+09:00", "timeZone": "Asia/Tokyo"},
                "location": "本社"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt1", "summary": "会議"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = FixedTokens::granted();
        let out = service(&server, tokens.clone())
            .handle(request(
                "calendar___create_calendar_event",
                json!({
                    "summary": "会議",
                    "start_time": "2025-01-15T14:00:00+09:00",
                    "end_time": "2025-01-15T15:00:00+09:00",
                    "location": "本社",
                    "user_id": "U1",
                    "user_token": "jwt"
                }),
            ))
            .await;

        assert_eq!(out["success"], true);
        assert_eq!(out["event_id"], "evt1");
        let callers = tokens.callers.lock().unwrap();
        assert_eq!(callers[0], CallerIdentity::new("U1", Some("jwt".into())));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/evt1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt1",
                "summary": "会議",
                "location": "本社",
                "start": {"dateTime": "2025-01-15T14:00:00+09:00"},
                "end": {"dateTime": "2025-01-15T15:00:00+09:00"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/evt1"))
            .and(body_partial_json(json!({
                "summary": "定例会議",
                "location": "本社",
                "start": {"dateTime": "2025-01-15T14:00:00+09:00"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt1", "summary": "定例会議"})))
            .expect(1)
            .mount(&server)
            .await;

        let out = service(&server, FixedTokens::granted())
            .handle(request("update", json!({"event_id": "evt1", "summary": "定例会議"})))
            .await;
        assert_eq!(out, json!({"success": true, "event": {"id": "evt1", "summary": "定例会議"}}));
    }

    #[tokio::test]
    async fn test_delete_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let out = service(&server, FixedTokens::granted())
            .handle(request("delete", json!({"event_id": "nope"})))
            .await;
        assert_eq!(
            out,
            json!({"success": false, "error": "Google Calendar API error: 404 - Not Found"})
        );
    }

    #[tokio::test]
    async fn test_consent_required() {
        let server = MockServer::start().await;
        let tokens = Arc::new(FixedTokens {
            outcome: AccessToken::ConsentRequired {
                authorization_url: "https://consent.example/auth".into(),
            },
            callers: Mutex::new(Vec::new()),
        });
        let out = service(&server, tokens)
            .handle(request("list", json!({"user_id": "U1"})))
            .await;
        assert_eq!(out["success"], false);
        assert_eq!(out["authorization_url"], "https://consent.example/auth");
    }

    #[tokio::test]
    async fn test_list_validates_max_results() {
        let server = MockServer::start().await;
        let out = service(&server, FixedTokens::granted())
            .handle(request("list", json!({"max_results": 0})))
            .await;
        assert_eq!(out["success"], false);
    }

    #[test]
    fn test_check_order() {
        assert!(check_order("2025-01-15T14:00:00+09:00", "2025-01-15T15:00:00+09:00").is_ok());
        assert!(check_order("2025-01-15T15:00:00+09:00", "2025-01-15T06:00:00Z").is_err());
    }
}
