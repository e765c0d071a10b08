//! Google Calendar API client.
//!
//! `CalendarApi` is the seam between the tool dispatcher and the
//! remote service; `GoogleCalendar` is the real implementation, a thin
//! reqwest client over the Calendar v3 REST surface. Read operations
//! pass the provider's JSON through untouched.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::auth::Session;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Query parameters for events.list
#[derive(Debug, Clone)]
pub struct EventsQuery {
    pub calendar_id: String,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: i64,
    pub single_events: bool,
    pub order_by: String,
}

/// The remote calendar service as seen by the dispatcher.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(&self, query: &EventsQuery) -> Result<Value>;
    async fn list_calendars(&self) -> Result<Value>;
    async fn get_setting(&self, setting: &str) -> Result<String>;
    async fn query_free_busy(&self, body: &Value) -> Result<Value>;
    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &Value,
        conference_data_version: i64,
        supports_attachments: bool,
    ) -> Result<Value>;
    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
        send_updates: &str,
    ) -> Result<Value>;
    async fn delete_event(&self, calendar_id: &str, event_id: &str, send_updates: &str)
        -> Result<()>;
}

/// Authenticated handle to the Google Calendar v3 API.
///
/// Created once per process; the session inside is refreshed lazily
/// when the access token expires.
pub struct GoogleCalendar {
    http: reqwest::Client,
    base_url: String,
    session: Mutex<Session>,
}

impl GoogleCalendar {
    pub fn new(session: Session) -> Self {
        Self::with_base_url(session, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(session: Session, base_url: &str) -> Self {
        GoogleCalendar {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Mutex::new(session),
        }
    }

    /// Current access token, refreshing the session first if expired.
    async fn token(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        if session.is_expired() {
            tracing::debug!("access token expired, refreshing");
            session.refresh(&self.http).await?;
        }

        Ok(session.access_token().to_string())
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }
}

/// Bail with the response body on a non-2xx status.
async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("Google Calendar API error ({}): {}", status, body)
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn list_events(&self, query: &EventsQuery) -> Result<Value> {
        let token = self.token().await?;

        let mut params = vec![
            ("maxResults", query.max_results.to_string()),
            ("singleEvents", query.single_events.to_string()),
            ("orderBy", query.order_by.clone()),
        ];
        if let Some(ref time_min) = query.time_min {
            params.push(("timeMin", time_min.clone()));
        }
        if let Some(ref time_max) = query.time_max {
            params.push(("timeMax", time_max.clone()));
        }

        let response = self
            .http
            .get(self.events_url(&query.calendar_id))
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await
            .context("Failed to fetch events")?;

        let response = expect_success(response).await?;
        response.json().await.context("Failed to parse events response")
    }

    async fn list_calendars(&self) -> Result<Value> {
        let token = self.token().await?;

        let response = self
            .http
            .get(format!("{}/users/me/calendarList", self.base_url))
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to fetch calendar list")?;

        let response = expect_success(response).await?;
        response
            .json()
            .await
            .context("Failed to parse calendar list response")
    }

    async fn get_setting(&self, setting: &str) -> Result<String> {
        let token = self.token().await?;

        let response = self
            .http
            .get(format!(
                "{}/users/me/settings/{}",
                self.base_url,
                urlencoding::encode(setting)
            ))
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch setting: {}", setting))?;

        let response = expect_success(response).await?;
        let body: Value = response
            .json()
            .await
            .context("Failed to parse settings response")?;

        body.get("value")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .with_context(|| format!("Setting {} has no value", setting))
    }

    async fn query_free_busy(&self, body: &Value) -> Result<Value> {
        let token = self.token().await?;

        let response = self
            .http
            .post(format!("{}/freeBusy", self.base_url))
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .context("Failed to query free/busy")?;

        let response = expect_success(response).await?;
        response
            .json()
            .await
            .context("Failed to parse free/busy response")
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &Value,
        conference_data_version: i64,
        supports_attachments: bool,
    ) -> Result<Value> {
        let token = self.token().await?;

        let response = self
            .http
            .post(self.events_url(calendar_id))
            .bearer_auth(&token)
            .query(&[
                (
                    "conferenceDataVersion",
                    conference_data_version.to_string(),
                ),
                ("supportsAttachments", supports_attachments.to_string()),
            ])
            .json(body)
            .send()
            .await
            .context("Failed to create event")?;

        let response = expect_success(response).await?;
        response
            .json()
            .await
            .context("Failed to parse created event response")
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
        send_updates: &str,
    ) -> Result<Value> {
        let token = self.token().await?;

        let response = self
            .http
            .patch(self.event_url(calendar_id, event_id))
            .bearer_auth(&token)
            .query(&[("sendUpdates", send_updates)])
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to update event: {}", event_id))?;

        let response = expect_success(response).await?;
        response
            .json()
            .await
            .context("Failed to parse updated event response")
    }

    async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        send_updates: &str,
    ) -> Result<()> {
        let token = self.token().await?;

        let response = self
            .http
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(&token)
            .query(&[("sendUpdates", send_updates)])
            .send()
            .await
            .with_context(|| format!("Failed to delete event: {}", event_id))?;

        // An already-deleted event comes back as 410 Gone; treat it as
        // success like a repeated delete.
        if response.status() == reqwest::StatusCode::GONE {
            return Ok(());
        }

        expect_success(response).await?;
        Ok(())
    }
}
