//! The tool dispatcher.
//!
//! One `CalendarServer` carries the whole tool surface; both the stdio
//! and the SSE binaries bind it unchanged. Every tool returns a single
//! pretty-printed JSON document. Remote failures become `{"error": ..}`
//! envelopes rather than protocol errors, so one failed call never
//! takes the server down.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde_json::{json, Map, Value};

use crate::conflicts::{check_time_slot_conflicts, ConflictReport};
use crate::datetime::normalize_datetime;
use crate::gcal::{CalendarApi, EventsQuery};
use crate::schemas::{
    CheckAvailabilityParams, CreateEventParams, DeleteEventParams, GetEventsParams, OrderBy,
    UpdateEventParams,
};
use crate::timezone::TimezoneCache;

const DEFAULT_MAX_RESULTS: i64 = 10;

fn json_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn error_envelope(message: String) -> String {
    json_pretty(&json!({ "error": message }))
}

fn conflict_envelope(message: &str, report: &ConflictReport) -> String {
    json_pretty(&json!({
        "error": message,
        "status": "CONFLICT",
        "conflicting_events": report.conflicts,
        "conflict_check_error": report.error,
    }))
}

/// Google Calendar tool server, shared by both transports.
#[derive(Clone)]
pub struct CalendarServer {
    api: Arc<dyn CalendarApi>,
    timezones: Arc<TimezoneCache>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CalendarServer {
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        CalendarServer {
            api,
            timezones: Arc::new(TimezoneCache::new()),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "get-events",
        description = "Get events from a Google Calendar. Accepts RFC3339 timestamps or bare dates for the time bounds."
    )]
    async fn get_events(&self, Parameters(params): Parameters<GetEventsParams>) -> String {
        if let Err(message) = params.validate() {
            return error_envelope(message);
        }

        let user_tz = self.timezones.resolve(self.api.as_ref()).await;
        let query = EventsQuery {
            calendar_id: params.calendar_id,
            time_min: params
                .time_min
                .map(|time_min| normalize_datetime(&time_min, &user_tz)),
            time_max: params
                .time_max
                .map(|time_max| normalize_datetime(&time_max, &user_tz)),
            max_results: params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            single_events: params.single_events.unwrap_or(true),
            order_by: params
                .order_by
                .unwrap_or(OrderBy::StartTime)
                .as_str()
                .to_string(),
        };

        match self.api.list_events(&query).await {
            Ok(result) => json_pretty(&result),
            Err(e) => error_envelope(format!("Error calling Google Calendar API: {:#}", e)),
        }
    }

    #[tool(name = "list-calendars", description = "List all available calendars")]
    async fn list_calendars(&self) -> String {
        match self.api.list_calendars().await {
            Ok(result) => json_pretty(&result),
            Err(e) => error_envelope(format!("Error listing calendars: {:#}", e)),
        }
    }

    #[tool(
        name = "get-timezone-info",
        description = "Get the current timezone information from Google Calendar"
    )]
    async fn get_timezone_info(&self) -> String {
        let user_tz = self.timezones.resolve(self.api.as_ref()).await;

        let tz: Tz = match user_tz.parse() {
            Ok(tz) => tz,
            Err(_) => {
                return error_envelope(format!(
                    "Error getting timezone info: unknown timezone {}",
                    user_tz
                ))
            }
        };

        let now_utc = Utc::now();
        let now_local = now_utc.with_timezone(&tz);

        json_pretty(&json!({
            "timezone": user_tz,
            "current_utc_time": now_utc.to_rfc3339(),
            "current_local_time": now_local.to_rfc3339(),
            "utc_offset": now_local.format("%z").to_string(),
            "timezone_name": now_local.format("%Z").to_string(),
        }))
    }

    #[tool(
        name = "get-current-date",
        description = "Get the current date and time in the user's timezone. Useful for models that may have outdated knowledge of the current date."
    )]
    async fn get_current_date(&self) -> String {
        let user_tz = self.timezones.resolve(self.api.as_ref()).await;

        let tz: Tz = match user_tz.parse() {
            Ok(tz) => tz,
            Err(_) => {
                return error_envelope(format!(
                    "Error getting current date: unknown timezone {}",
                    user_tz
                ))
            }
        };

        let now_utc = Utc::now();
        let now_local = now_utc.with_timezone(&tz);

        json_pretty(&json!({
            "current_date": now_local.format("%Y-%m-%d").to_string(),
            "current_time": now_local.format("%H:%M:%S").to_string(),
            "current_datetime": now_local.format("%Y-%m-%d %H:%M:%S").to_string(),
            "current_datetime_iso": now_local.to_rfc3339(),
            "timezone": user_tz,
            "day_of_week": now_local.format("%A").to_string(),
            "formatted_date": now_local.format("%B %d, %Y").to_string(),
            "utc_datetime": now_utc.to_rfc3339(),
            "timestamp": now_local.timestamp(),
        }))
    }

    #[tool(
        name = "check-availability",
        description = "Check free/busy availability for one or more calendars over a time range"
    )]
    async fn check_availability(
        &self,
        Parameters(params): Parameters<CheckAvailabilityParams>,
    ) -> String {
        if let Err(message) = params.validate() {
            return error_envelope(message);
        }

        let user_tz = self.timezones.resolve(self.api.as_ref()).await;
        let time_min = normalize_datetime(&params.time_min, &user_tz);
        let time_max = normalize_datetime(&params.time_max, &user_tz);

        let items: Vec<Value> = params
            .items
            .map(|items| items.iter().map(|item| json!({"id": item.id})).collect())
            .unwrap_or_else(|| vec![json!({"id": "primary"})]);

        let mut body = Map::new();
        body.insert("timeMin".into(), json!(time_min));
        body.insert("timeMax".into(), json!(time_max));
        body.insert(
            "timeZone".into(),
            json!(params.time_zone.as_deref().unwrap_or("UTC")),
        );
        if let Some(calendar_expansion_max) = params.calendar_expansion_max {
            body.insert("calendarExpansionMax".into(), json!(calendar_expansion_max));
        }
        if let Some(group_expansion_max) = params.group_expansion_max {
            body.insert("groupExpansionMax".into(), json!(group_expansion_max));
        }
        body.insert("items".into(), Value::Array(items));

        match self.api.query_free_busy(&Value::Object(body)).await {
            Ok(result) => json_pretty(&result),
            Err(e) => error_envelope(format!("Error checking availability: {:#}", e)),
        }
    }

    #[tool(
        name = "create-event",
        description = "Create an event in Google Calendar. Supports both simple and complex events with all advanced features."
    )]
    async fn create_event(&self, Parameters(params): Parameters<CreateEventParams>) -> String {
        if let Err(message) = params.validate() {
            return error_envelope(message);
        }

        let user_tz = match params.timezone {
            Some(ref timezone) => timezone.clone(),
            None => self.timezones.resolve(self.api.as_ref()).await,
        };

        let fixed_start = normalize_datetime(&params.start_datetime, &user_tz);
        let fixed_end = normalize_datetime(&params.end_datetime, &user_tz);

        let report = check_time_slot_conflicts(
            self.api.as_ref(),
            &self.timezones,
            &params.calendar_id,
            &fixed_start,
            &fixed_end,
        )
        .await;

        if report.has_conflicts {
            tracing::debug!(calendar_id = %params.calendar_id, "create blocked by conflicting events");
            return conflict_envelope(
                "Time slot is not available - there are overlapping events",
                &report,
            );
        }

        let mut event = Map::new();
        event.insert("summary".into(), json!(params.summary));
        event.insert(
            "start".into(),
            json!({"dateTime": fixed_start, "timeZone": user_tz}),
        );
        event.insert(
            "end".into(),
            json!({"dateTime": fixed_end, "timeZone": user_tz}),
        );

        if let Some(ref description) = params.description {
            event.insert("description".into(), json!(description));
        }
        if let Some(ref location) = params.location {
            event.insert("location".into(), json!(location));
        }
        if let Some(ref color_id) = params.color_id {
            event.insert("colorId".into(), json!(color_id));
        }
        if let Some(visibility) = params.visibility {
            event.insert("visibility".into(), json!(visibility.as_str()));
        }
        if let Some(transparency) = params.transparency {
            event.insert("transparency".into(), json!(transparency.as_str()));
        }
        if let Some(ref recurrence) = params.recurrence {
            event.insert("recurrence".into(), json!(recurrence));
        }
        if let Some(ref reminders) = params.reminders {
            event.insert("reminders".into(), reminders.to_provider_json());
        }
        if let Some(ref attendees) = params.attendees {
            let attendees: Vec<Value> = attendees.iter().map(|a| a.to_provider_json()).collect();
            event.insert("attendees".into(), Value::Array(attendees));
        }
        if let Some(ref attachments) = params.attachments {
            let attachments: Vec<Value> =
                attachments.iter().map(|a| a.to_provider_json()).collect();
            event.insert("attachments".into(), Value::Array(attachments));
        }
        if let Some(ref conference_data) = params.conference_data {
            event.insert("conferenceData".into(), conference_data.clone());
        }

        let conference_data_version = if params.conference_data.is_some() { 1 } else { 0 };
        let supports_attachments = params
            .attachments
            .as_ref()
            .is_some_and(|attachments| !attachments.is_empty());

        let result = self
            .api
            .insert_event(
                &params.calendar_id,
                &Value::Object(event),
                conference_data_version,
                supports_attachments,
            )
            .await;

        match result {
            Ok(created) => json_pretty(&json!({
                "success": true,
                "event": created,
                "message": format!(
                    "Event '{}' created successfully from {} to {} ({})",
                    params.summary, params.start_datetime, params.end_datetime, user_tz
                ),
                "event_link": created.get("htmlLink").cloned().unwrap_or(Value::Null),
                "event_id": created.get("id").cloned().unwrap_or(Value::Null),
            })),
            Err(e) => error_envelope(format!("Error creating event: {:#}", e)),
        }
    }

    #[tool(name = "delete-event", description = "Delete an event from Google Calendar")]
    async fn delete_event(&self, Parameters(params): Parameters<DeleteEventParams>) -> String {
        let result = self
            .api
            .delete_event(
                &params.calendar_id,
                &params.event_id,
                params.send_updates.as_str(),
            )
            .await;

        match result {
            Ok(()) => json_pretty(&json!({
                "success": true,
                "message": format!("Event {} deleted successfully", params.event_id),
            })),
            Err(e) => error_envelope(format!("Error deleting event: {:#}", e)),
        }
    }

    #[tool(
        name = "update-event",
        description = "Update an existing event in Google Calendar. All fields are optional - only specify the fields you want to update."
    )]
    async fn update_event(&self, Parameters(params): Parameters<UpdateEventParams>) -> String {
        if let Err(message) = params.validate() {
            return error_envelope(message);
        }

        let mut update = Map::new();

        if let Some(ref summary) = params.summary {
            update.insert("summary".into(), json!(summary));
        }
        if let Some(ref description) = params.description {
            update.insert("description".into(), json!(description));
        }
        if let Some(ref location) = params.location {
            update.insert("location".into(), json!(location));
        }
        if let Some(ref color_id) = params.color_id {
            update.insert("colorId".into(), json!(color_id));
        }
        if let Some(visibility) = params.visibility {
            update.insert("visibility".into(), json!(visibility.as_str()));
        }
        if let Some(transparency) = params.transparency {
            update.insert("transparency".into(), json!(transparency.as_str()));
        }
        if let Some(ref recurrence) = params.recurrence {
            update.insert("recurrence".into(), json!(recurrence));
        }
        if let Some(ref reminders) = params.reminders {
            update.insert("reminders".into(), reminders.to_provider_json());
        }
        if let Some(ref attendees) = params.attendees {
            let attendees: Vec<Value> = attendees.iter().map(|a| a.to_provider_json()).collect();
            update.insert("attendees".into(), Value::Array(attendees));
        }

        if params.start_datetime.is_some() || params.end_datetime.is_some() {
            let user_tz = match params.timezone {
                Some(ref timezone) => timezone.clone(),
                None => self.timezones.resolve(self.api.as_ref()).await,
            };

            if let Some(ref start_datetime) = params.start_datetime {
                let fixed_start = normalize_datetime(start_datetime, &user_tz);
                update.insert(
                    "start".into(),
                    json!({"dateTime": fixed_start, "timeZone": user_tz}),
                );
            }
            if let Some(ref end_datetime) = params.end_datetime {
                let fixed_end = normalize_datetime(end_datetime, &user_tz);
                update.insert(
                    "end".into(),
                    json!({"dateTime": fixed_end, "timeZone": user_tz}),
                );
            }

            // Conflict checking needs a complete interval; a lone start
            // or end is still applied field-by-field without a check.
            if let (Some(start), Some(end)) = (update.get("start").cloned(), update.get("end").cloned())
            {
                let report = check_time_slot_conflicts(
                    self.api.as_ref(),
                    &self.timezones,
                    &params.calendar_id,
                    start["dateTime"].as_str().unwrap_or_default(),
                    end["dateTime"].as_str().unwrap_or_default(),
                )
                .await;

                if report.has_conflicts {
                    tracing::debug!(
                        calendar_id = %params.calendar_id,
                        event_id = %params.event_id,
                        "reschedule blocked by conflicting events"
                    );
                    return conflict_envelope(
                        "New time slot is not available - there are overlapping events",
                        &report,
                    );
                }
            }
        }

        if update.is_empty() {
            return error_envelope(
                "No fields provided to update. Please specify at least one field to update."
                    .to_string(),
            );
        }

        let updated_fields: Vec<String> = update.keys().cloned().collect();

        let result = self
            .api
            .patch_event(
                &params.calendar_id,
                &params.event_id,
                &Value::Object(update),
                params.send_updates.as_str(),
            )
            .await;

        match result {
            Ok(updated) => {
                let title = updated
                    .get("summary")
                    .and_then(|summary| summary.as_str())
                    .unwrap_or(&params.event_id);
                json_pretty(&json!({
                    "success": true,
                    "event": updated,
                    "message": format!("Event '{}' updated successfully", title),
                    "updated_fields": updated_fields,
                    "event_link": updated.get("htmlLink").cloned().unwrap_or(Value::Null),
                }))
            }
            Err(e) => error_envelope(format!("Error updating event: {:#}", e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for CalendarServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gcal-mcp".into(),
                title: Some("Google Calendar MCP Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Google Calendar tools: list and search events, check availability, \
                 and create, update or delete events."
                    .into(),
            ),
        }
    }
}
