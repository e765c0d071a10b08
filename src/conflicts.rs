//! Availability checking for event creation and rescheduling.
//!
//! A candidate interval is checked against the calendar's free/busy
//! data before a mutating call. The check fails open: if the free/busy
//! query itself fails, the mutation proceeds and the report carries the
//! error instead. The check and the mutation are not transactional, so
//! blocking writes on a failed check would only trade availability for
//! a conflict guarantee the API cannot give.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Value};

use crate::datetime::normalize_datetime;
use crate::gcal::CalendarApi;
use crate::timezone::TimezoneCache;

/// Result of one availability check.
#[derive(Debug, Serialize)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    pub conflicts: Vec<Value>,
    pub error: Option<String>,
}

/// Check a time slot for overlapping events on a single calendar.
///
/// Busy intervals come back from the API in UTC; each one is converted
/// to the resolved session timezone for display. A slot that cannot be
/// converted is passed through unchanged.
pub async fn check_time_slot_conflicts(
    api: &dyn CalendarApi,
    timezones: &TimezoneCache,
    calendar_id: &str,
    start_time: &str,
    end_time: &str,
) -> ConflictReport {
    let user_tz = timezones.resolve(api).await;

    let time_min = normalize_datetime(start_time, &user_tz);
    let time_max = normalize_datetime(end_time, &user_tz);

    let body = json!({
        "timeMin": time_min,
        "timeMax": time_max,
        "items": [{"id": calendar_id}],
    });

    let response = match api.query_free_busy(&body).await {
        Ok(response) => response,
        Err(e) => {
            return ConflictReport {
                has_conflicts: false,
                conflicts: vec![],
                error: Some(format!("Could not check for conflicts: {:#}", e)),
            };
        }
    };

    let busy_slots = response
        .get("calendars")
        .and_then(|calendars| calendars.get(calendar_id))
        .and_then(|calendar| calendar.get("busy"))
        .and_then(|busy| busy.as_array())
        .cloned()
        .unwrap_or_default();

    let conflicts = busy_slots
        .iter()
        .map(|slot| localize_slot(slot, &user_tz).unwrap_or_else(|| slot.clone()))
        .collect();

    ConflictReport {
        has_conflicts: !busy_slots.is_empty(),
        conflicts,
        error: None,
    }
}

/// Convert one busy slot from UTC to the user's timezone, with
/// human-readable display strings.
fn localize_slot(slot: &Value, user_tz: &str) -> Option<Value> {
    let tz: Tz = user_tz.parse().ok()?;

    let start = DateTime::parse_from_rfc3339(slot.get("start")?.as_str()?).ok()?;
    let end = DateTime::parse_from_rfc3339(slot.get("end")?.as_str()?).ok()?;

    let start_local = start.with_timezone(&tz);
    let end_local = end.with_timezone(&tz);

    Some(json!({
        "start": start_local.to_rfc3339(),
        "end": end_local.to_rfc3339(),
        "timezone": user_tz,
        "start_display": start_local.format("%Y-%m-%d %H:%M").to_string(),
        "end_display": end_local.format("%Y-%m-%d %H:%M").to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::gcal::EventsQuery;

    /// Free/busy stub: a fixed settings timezone plus either a canned
    /// response or a query failure.
    struct FreeBusyApi {
        timezone: &'static str,
        response: Result<Value, String>,
    }

    #[async_trait]
    impl CalendarApi for FreeBusyApi {
        async fn list_events(&self, _query: &EventsQuery) -> Result<Value> {
            unimplemented!()
        }
        async fn list_calendars(&self) -> Result<Value> {
            unimplemented!()
        }
        async fn get_setting(&self, _setting: &str) -> Result<String> {
            Ok(self.timezone.to_string())
        }
        async fn query_free_busy(&self, _body: &Value) -> Result<Value> {
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(message) => anyhow::bail!("{}", message),
            }
        }
        async fn insert_event(
            &self,
            _calendar_id: &str,
            _body: &Value,
            _conference_data_version: i64,
            _supports_attachments: bool,
        ) -> Result<Value> {
            unimplemented!()
        }
        async fn patch_event(
            &self,
            _calendar_id: &str,
            _event_id: &str,
            _body: &Value,
            _send_updates: &str,
        ) -> Result<Value> {
            unimplemented!()
        }
        async fn delete_event(
            &self,
            _calendar_id: &str,
            _event_id: &str,
            _send_updates: &str,
        ) -> Result<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn empty_busy_list_means_no_conflicts() {
        let api = FreeBusyApi {
            timezone: "America/New_York",
            response: Ok(json!({"calendars": {"primary": {"busy": []}}})),
        };
        let report = check_time_slot_conflicts(
            &api,
            &TimezoneCache::new(),
            "primary",
            "2024-01-15T10:00:00",
            "2024-01-15T11:00:00",
        )
        .await;

        assert!(!report.has_conflicts);
        assert!(report.conflicts.is_empty());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn busy_slots_are_localized() {
        let api = FreeBusyApi {
            timezone: "America/New_York",
            response: Ok(json!({
                "calendars": {"primary": {"busy": [
                    {"start": "2024-01-15T15:00:00Z", "end": "2024-01-15T16:00:00Z"},
                    {"start": "2024-01-15T18:30:00Z", "end": "2024-01-15T19:00:00Z"},
                ]}},
            })),
        };
        let report = check_time_slot_conflicts(
            &api,
            &TimezoneCache::new(),
            "primary",
            "2024-01-15T09:00:00",
            "2024-01-15T17:00:00",
        )
        .await;

        assert!(report.has_conflicts);
        assert_eq!(report.conflicts.len(), 2);
        assert_eq!(report.conflicts[0]["timezone"], "America/New_York");
        // 15:00 UTC is 10:00 in New York in January
        assert_eq!(report.conflicts[0]["start"], "2024-01-15T10:00:00-05:00");
        assert_eq!(report.conflicts[0]["start_display"], "2024-01-15 10:00");
        assert_eq!(report.conflicts[1]["start_display"], "2024-01-15 13:30");
    }

    #[tokio::test]
    async fn unparseable_slot_passes_through() {
        let raw_slot = json!({"start": "not-a-time", "end": "also-not"});
        let api = FreeBusyApi {
            timezone: "America/New_York",
            response: Ok(json!({"calendars": {"primary": {"busy": [raw_slot.clone()]}}})),
        };
        let report = check_time_slot_conflicts(
            &api,
            &TimezoneCache::new(),
            "primary",
            "2024-01-15T09:00:00",
            "2024-01-15T17:00:00",
        )
        .await;

        assert!(report.has_conflicts);
        assert_eq!(report.conflicts[0], raw_slot);
    }

    #[tokio::test]
    async fn failed_query_fails_open() {
        let api = FreeBusyApi {
            timezone: "UTC",
            response: Err("connection reset".to_string()),
        };
        let report = check_time_slot_conflicts(
            &api,
            &TimezoneCache::new(),
            "primary",
            "2024-01-15T10:00:00",
            "2024-01-15T11:00:00",
        )
        .await;

        assert!(!report.has_conflicts);
        assert!(report.conflicts.is_empty());
        assert!(report.error.as_deref().unwrap().contains("connection reset"));
    }
}
