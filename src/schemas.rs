//! Typed tool parameters and request validation.
//!
//! Each tool's arguments deserialize into one of these structs; the
//! derived JSON schema is what MCP clients discover. Validation runs
//! before any network call and aggregates every violation into a
//! single message, so a caller sees all problems at once. Projection
//! methods turn validated input into the provider's event resource
//! shape, emitting only the fields the caller supplied.

use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const MAX_ATTACHMENTS: usize = 25;
pub const MAX_CALENDAR_EXPANSION: i64 = 50;
pub const MAX_GROUP_EXPANSION: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    StartTime,
    Updated,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::StartTime => "startTime",
            OrderBy::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::NeedsAction => "needsAction",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

impl ReminderMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderMethod::Email => "email",
            ReminderMethod::Popup => "popup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Default,
    Public,
    Private,
    Confidential,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Default => "default",
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Confidential => "confidential",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Transparency {
    Opaque,
    Transparent,
}

impl Transparency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transparency::Opaque => "opaque",
            Transparency::Transparent => "transparent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SendUpdates {
    #[default]
    All,
    ExternalOnly,
    None,
}

impl SendUpdates {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendUpdates::All => "all",
            SendUpdates::ExternalOnly => "externalOnly",
            SendUpdates::None => "none",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AttendeeInput {
    /// The attendee's email address
    pub email: String,
    /// The attendee's name, if available
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    /// Whether this is an optional attendee
    pub optional: Option<bool>,
    /// The attendee's response status
    #[serde(rename = "responseStatus")]
    pub response_status: Option<ResponseStatus>,
    /// The attendee's response comment
    pub comment: Option<String>,
    /// Number of additional guests
    #[serde(rename = "additionalGuests")]
    pub additional_guests: Option<i64>,
}

impl AttendeeInput {
    /// Provider-shaped attendee object. Optional flag, response status
    /// and guest count always carry their defaults; display name and
    /// comment are emitted only when supplied.
    pub fn to_provider_json(&self) -> Value {
        let mut attendee = Map::new();
        attendee.insert("email".into(), json!(self.email));
        if let Some(ref display_name) = self.display_name {
            attendee.insert("displayName".into(), json!(display_name));
        }
        attendee.insert("optional".into(), json!(self.optional.unwrap_or(false)));
        attendee.insert(
            "responseStatus".into(),
            json!(self
                .response_status
                .unwrap_or(ResponseStatus::NeedsAction)
                .as_str()),
        );
        if let Some(ref comment) = self.comment {
            attendee.insert("comment".into(), json!(comment));
        }
        attendee.insert(
            "additionalGuests".into(),
            json!(self.additional_guests.unwrap_or(0)),
        );
        Value::Object(attendee)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AttachmentInput {
    /// ID of the Google Drive file
    #[serde(rename = "fileId")]
    pub file_id: String,
    /// URL of the file in Google Drive
    #[serde(rename = "fileUrl")]
    pub file_url: Option<String>,
    /// Title of the attachment
    pub title: Option<String>,
    /// MIME type of the attachment
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

impl AttachmentInput {
    pub fn to_provider_json(&self) -> Value {
        let mut attachment = Map::new();
        attachment.insert("fileId".into(), json!(self.file_id));
        if let Some(ref file_url) = self.file_url {
            attachment.insert("fileUrl".into(), json!(file_url));
        }
        if let Some(ref title) = self.title {
            attachment.insert("title".into(), json!(title));
        }
        if let Some(ref mime_type) = self.mime_type {
            attachment.insert("mimeType".into(), json!(mime_type));
        }
        Value::Object(attachment)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReminderOverride {
    /// The method used by this reminder
    pub method: ReminderMethod,
    /// Number of minutes before the event to trigger the reminder
    pub minutes: i64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RemindersInput {
    /// Whether to use the default reminders of the calendar
    #[serde(rename = "useDefault")]
    pub use_default: Option<bool>,
    /// Custom reminders for the event
    pub overrides: Option<Vec<ReminderOverride>>,
}

impl RemindersInput {
    pub fn to_provider_json(&self) -> Value {
        let mut reminders = Map::new();
        if let Some(use_default) = self.use_default {
            reminders.insert("useDefault".into(), json!(use_default));
        }
        if let Some(ref overrides) = self.overrides {
            let overrides: Vec<Value> = overrides
                .iter()
                .map(|o| json!({"method": o.method.as_str(), "minutes": o.minutes}))
                .collect();
            reminders.insert("overrides".into(), Value::Array(overrides));
        }
        Value::Object(reminders)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetEventsParams {
    /// Calendar ID or 'primary' for the user's primary calendar
    #[serde(rename = "calendarId")]
    pub calendar_id: String,
    /// Lower bound (inclusive) for an event's end time, RFC3339 or bare date
    #[serde(rename = "timeMin")]
    pub time_min: Option<String>,
    /// Upper bound (exclusive) for an event's start time, RFC3339 or bare date
    #[serde(rename = "timeMax")]
    pub time_max: Option<String>,
    /// Maximum number of events returned (default 10)
    #[serde(rename = "maxResults")]
    pub max_results: Option<i64>,
    /// Whether to expand recurring events into instances (default true)
    #[serde(rename = "singleEvents")]
    pub single_events: Option<bool>,
    /// Order of events returned (default startTime)
    #[serde(rename = "orderBy")]
    pub order_by: Option<OrderBy>,
}

impl GetEventsParams {
    pub fn validate(&self) -> Result<(), String> {
        let mut violations = Vec::new();
        if let Some(max_results) = self.max_results {
            if max_results < 1 {
                violations.push("maxResults: must be at least 1".to_string());
            }
        }
        aggregate(violations)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FreeBusyItem {
    /// The identifier of a calendar or a group
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckAvailabilityParams {
    /// The start of the interval for the query, RFC3339 or bare date
    #[serde(rename = "timeMin")]
    pub time_min: String,
    /// The end of the interval for the query, RFC3339 or bare date
    #[serde(rename = "timeMax")]
    pub time_max: String,
    /// Time zone used in the response (default UTC)
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    /// Maximal number of calendars for which free/busy information is provided (max 50)
    #[serde(rename = "calendarExpansionMax")]
    pub calendar_expansion_max: Option<i64>,
    /// Maximal number of calendar identifiers provided for a single group (max 100)
    #[serde(rename = "groupExpansionMax")]
    pub group_expansion_max: Option<i64>,
    /// Calendars and/or groups to query (default [{"id": "primary"}])
    pub items: Option<Vec<FreeBusyItem>>,
}

impl CheckAvailabilityParams {
    pub fn validate(&self) -> Result<(), String> {
        let mut violations = Vec::new();
        if let Some(calendar_expansion_max) = self.calendar_expansion_max {
            if calendar_expansion_max > MAX_CALENDAR_EXPANSION {
                violations.push(format!(
                    "calendarExpansionMax: must be at most {}",
                    MAX_CALENDAR_EXPANSION
                ));
            }
        }
        if let Some(group_expansion_max) = self.group_expansion_max {
            if group_expansion_max > MAX_GROUP_EXPANSION {
                violations.push(format!(
                    "groupExpansionMax: must be at most {}",
                    MAX_GROUP_EXPANSION
                ));
            }
        }
        aggregate(violations)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateEventParams {
    /// The ID of the calendar to create the event in, or 'primary'
    #[serde(rename = "calendarId")]
    pub calendar_id: String,
    /// Title of the event
    pub summary: String,
    /// Start time (YYYY-MM-DDTHH:MM:SS or RFC3339)
    pub start_datetime: String,
    /// End time (YYYY-MM-DDTHH:MM:SS or RFC3339)
    pub end_datetime: String,
    /// Description of the event. Can contain HTML.
    pub description: Option<String>,
    /// Geographic location of the event as free-form text
    pub location: Option<String>,
    /// The color of the event
    #[serde(rename = "colorId")]
    pub color_id: Option<String>,
    /// Timezone for the event (auto-detected if not provided)
    pub timezone: Option<String>,
    /// RRULE, EXRULE, RDATE and EXDATE lines for a recurring event
    pub recurrence: Option<Vec<String>>,
    /// The attendees of the event
    pub attendees: Option<Vec<AttendeeInput>>,
    /// File attachments for the event (Google Drive files only, max 25)
    pub attachments: Option<Vec<AttachmentInput>>,
    /// Reminders for the event
    pub reminders: Option<RemindersInput>,
    /// Visibility of the event
    pub visibility: Option<Visibility>,
    /// Whether the event blocks time on the calendar
    pub transparency: Option<Transparency>,
    /// Conference-related information, passed through to the provider
    #[serde(rename = "conferenceData")]
    pub conference_data: Option<Value>,
}

impl CreateEventParams {
    pub fn validate(&self) -> Result<(), String> {
        let mut violations = Vec::new();
        validate_attendees(self.attendees.as_deref(), &mut violations);
        validate_attachments(self.attachments.as_deref(), &mut violations);
        validate_reminders(self.reminders.as_ref(), &mut violations);
        aggregate(violations)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateEventParams {
    /// The ID of the calendar containing the event, or 'primary'
    #[serde(rename = "calendarId")]
    pub calendar_id: String,
    /// The ID of the event to update
    #[serde(rename = "eventId")]
    pub event_id: String,
    /// New title of the event
    pub summary: Option<String>,
    /// New description of the event. Can contain HTML.
    pub description: Option<String>,
    /// New location of the event
    pub location: Option<String>,
    /// The color of the event
    #[serde(rename = "colorId")]
    pub color_id: Option<String>,
    /// New start time (YYYY-MM-DDTHH:MM:SS or RFC3339)
    pub start_datetime: Option<String>,
    /// New end time (YYYY-MM-DDTHH:MM:SS or RFC3339)
    pub end_datetime: Option<String>,
    /// Timezone for the event (auto-detected if not provided)
    pub timezone: Option<String>,
    /// List of attendees for the event
    pub attendees: Option<Vec<AttendeeInput>>,
    /// RRULE, EXRULE, RDATE and EXDATE lines for a recurring event
    pub recurrence: Option<Vec<String>>,
    /// Reminders for the event
    pub reminders: Option<RemindersInput>,
    /// Visibility of the event
    pub visibility: Option<Visibility>,
    /// Whether the event blocks time on the calendar
    pub transparency: Option<Transparency>,
    /// Whether to send notifications about the update to attendees
    #[serde(rename = "sendUpdates", default)]
    pub send_updates: SendUpdates,
}

impl UpdateEventParams {
    pub fn validate(&self) -> Result<(), String> {
        let mut violations = Vec::new();
        validate_attendees(self.attendees.as_deref(), &mut violations);
        validate_reminders(self.reminders.as_ref(), &mut violations);
        aggregate(violations)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteEventParams {
    /// The ID of the calendar containing the event, or 'primary'
    #[serde(rename = "calendarId")]
    pub calendar_id: String,
    /// The ID of the event to delete
    #[serde(rename = "eventId")]
    pub event_id: String,
    /// Whether to send notifications about the deletion to attendees
    #[serde(rename = "sendUpdates", default)]
    pub send_updates: SendUpdates,
}

fn validate_attendees(attendees: Option<&[AttendeeInput]>, violations: &mut Vec<String>) {
    let Some(attendees) = attendees else {
        return;
    };
    for (i, attendee) in attendees.iter().enumerate() {
        if !looks_like_email(&attendee.email) {
            violations.push(format!(
                "attendees[{}].email: '{}' is not a valid email address",
                i, attendee.email
            ));
        }
        if attendee.additional_guests.unwrap_or(0) < 0 {
            violations.push(format!(
                "attendees[{}].additionalGuests: must be non-negative",
                i
            ));
        }
    }
}

fn validate_attachments(attachments: Option<&[AttachmentInput]>, violations: &mut Vec<String>) {
    let Some(attachments) = attachments else {
        return;
    };
    if attachments.len() > MAX_ATTACHMENTS {
        violations.push(format!(
            "attachments: at most {} attachments are allowed, got {}",
            MAX_ATTACHMENTS,
            attachments.len()
        ));
    }
}

fn validate_reminders(reminders: Option<&RemindersInput>, violations: &mut Vec<String>) {
    let Some(overrides) = reminders.and_then(|r| r.overrides.as_ref()) else {
        return;
    };
    for (i, reminder) in overrides.iter().enumerate() {
        if reminder.minutes < 0 {
            violations.push(format!(
                "reminders.overrides[{}].minutes: must be non-negative",
                i
            ));
        }
    }
}

/// Join violations into one message listing every offending field.
fn aggregate(violations: Vec<String>) -> Result<(), String> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(format!("Invalid arguments: {}", violations.join("; ")))
    }
}

/// Loose email shape check: one '@', non-empty local part, dotted
/// domain, no whitespace.
fn looks_like_email(candidate: &str) -> bool {
    let mut parts = candidate.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !candidate.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendee_projection_fills_defaults() {
        let attendee = AttendeeInput {
            email: "a@x.com".into(),
            display_name: None,
            optional: None,
            response_status: None,
            comment: None,
            additional_guests: None,
        };
        let body = attendee.to_provider_json();

        assert_eq!(body["email"], "a@x.com");
        assert_eq!(body["optional"], false);
        assert_eq!(body["responseStatus"], "needsAction");
        assert_eq!(body["additionalGuests"], 0);
        assert!(body.get("displayName").is_none());
        assert!(body.get("comment").is_none());
    }

    #[test]
    fn attendee_projection_keeps_supplied_fields() {
        let attendee = AttendeeInput {
            email: "b@x.com".into(),
            display_name: Some("B".into()),
            optional: Some(true),
            response_status: Some(ResponseStatus::Accepted),
            comment: Some("see you there".into()),
            additional_guests: Some(2),
        };
        let body = attendee.to_provider_json();

        assert_eq!(body["displayName"], "B");
        assert_eq!(body["optional"], true);
        assert_eq!(body["responseStatus"], "accepted");
        assert_eq!(body["comment"], "see you there");
        assert_eq!(body["additionalGuests"], 2);
    }

    #[test]
    fn validation_aggregates_every_violation() {
        let params = CreateEventParams {
            calendar_id: "primary".into(),
            summary: "standup".into(),
            start_datetime: "2024-01-15T10:00:00".into(),
            end_datetime: "2024-01-15T10:15:00".into(),
            description: None,
            location: None,
            color_id: None,
            timezone: None,
            recurrence: None,
            attendees: Some(vec![AttendeeInput {
                email: "not-an-email".into(),
                display_name: None,
                optional: None,
                response_status: None,
                comment: None,
                additional_guests: Some(-1),
            }]),
            attachments: None,
            reminders: Some(RemindersInput {
                use_default: Some(false),
                overrides: Some(vec![ReminderOverride {
                    method: ReminderMethod::Popup,
                    minutes: -10,
                }]),
            }),
            visibility: None,
            transparency: None,
            conference_data: None,
        };

        let message = params.validate().unwrap_err();
        assert!(message.starts_with("Invalid arguments: "));
        assert!(message.contains("attendees[0].email"));
        assert!(message.contains("attendees[0].additionalGuests"));
        assert!(message.contains("reminders.overrides[0].minutes"));
    }

    #[test]
    fn attachment_count_is_capped() {
        let attachment = AttachmentInput {
            file_id: "f".into(),
            file_url: None,
            title: None,
            mime_type: None,
        };
        let attachments = vec![attachment; 26];
        let mut violations = Vec::new();
        validate_attachments(Some(attachments.as_slice()), &mut violations);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("at most 25"));
    }

    #[test]
    fn expansion_limits_are_bounded() {
        let params = CheckAvailabilityParams {
            time_min: "2024-01-01".into(),
            time_max: "2024-01-02".into(),
            time_zone: None,
            calendar_expansion_max: Some(51),
            group_expansion_max: Some(101),
            items: None,
        };
        let message = params.validate().unwrap_err();
        assert!(message.contains("calendarExpansionMax"));
        assert!(message.contains("groupExpansionMax"));
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@x.com"));
        assert!(looks_like_email("first.last@sub.example.org"));
        assert!(!looks_like_email("a@x"));
        assert!(!looks_like_email("@x.com"));
        assert!(!looks_like_email("a x@x.com"));
        assert!(!looks_like_email("plainstring"));
    }

    #[test]
    fn send_updates_defaults_to_all() {
        let params: DeleteEventParams = serde_json::from_value(serde_json::json!({
            "calendarId": "primary",
            "eventId": "abc",
        }))
        .unwrap();
        assert_eq!(params.send_updates, SendUpdates::All);
        assert_eq!(params.send_updates.as_str(), "all");
    }

    #[test]
    fn enums_deserialize_from_wire_names() {
        let status: ResponseStatus = serde_json::from_str("\"needsAction\"").unwrap();
        assert_eq!(status, ResponseStatus::NeedsAction);
        let updates: SendUpdates = serde_json::from_str("\"externalOnly\"").unwrap();
        assert_eq!(updates, SendUpdates::ExternalOnly);
        let order: OrderBy = serde_json::from_str("\"startTime\"").unwrap();
        assert_eq!(order, OrderBy::StartTime);
        assert!(serde_json::from_str::<Visibility>("\"secret\"").is_err());
    }
}
