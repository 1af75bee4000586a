use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::config::CalendarConfig;
use crate::error::CalendarError;

/// Query for `events.list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: u32,
}

/// Google Calendar REST v3 client for one calendar.
pub struct GoogleCalendarClient {
    http: Client,
    api_base: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(http: Client, config: &CalendarConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    async fn send(request: RequestBuilder, token: &str) -> Result<Response, CalendarError> {
        let resp = request.bearer_auth(token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// List single events ordered by start time.
    pub async fn list_events(&self, token: &str, query: &ListQuery) -> Result<Vec<Value>, CalendarError> {
        let mut params: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", query.max_results.to_string()),
        ];
        if let Some(t) = &query.time_min {
            params.push(("timeMin", t.clone()));
        }
        if let Some(t) = &query.time_max {
            params.push(("timeMax", t.clone()));
        }

        debug!("Google Calendar list {}", self.calendar_id);
        let resp = Self::send(self.http.get(self.events_url()).query(&params), token).await?;
        let body: Value = resp.json().await?;
        Ok(body
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn insert_event(&self, token: &str, event: &Value) -> Result<Value, CalendarError> {
        let resp = Self::send(self.http.post(self.events_url()).json(event), token).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_event(&self, token: &str, event_id: &str) -> Result<Value, CalendarError> {
        let resp = Self::send(self.http.get(self.event_url(event_id)), token).await?;
        Ok(resp.json().await?)
    }

    /// Full replacement of an event (`events.update`).
    pub async fn update_event(&self, token: &str, event_id: &str, event: &Value) -> Result<Value, CalendarError> {
        let resp = Self::send(self.http.put(self.event_url(event_id)).json(event), token).await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_event(&self, token: &str, event_id: &str) -> Result<(), CalendarError> {
        Self::send(self.http.delete(self.event_url(event_id)), token).await?;
        Ok(())
    }
}
