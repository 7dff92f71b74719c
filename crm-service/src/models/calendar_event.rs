use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, uuid_1_as_binary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

/// A meeting, call or follow-up on a tenant's calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub event_id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub scheduled_at: DateTime<Utc>,
    pub status: EventStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(tenant_id: Uuid, input: CreateCalendarEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id,
            title: input.title,
            description: input.description,
            contact_name: input.contact_name,
            scheduled_at: input.scheduled_at,
            status: EventStatus::Scheduled,
            created_utc: Utc::now(),
        }
    }

    /// Non-blank contact name.
    pub fn contact(&self) -> Option<&str> {
        self.contact_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }

    /// Contact name when set, otherwise the event title.
    pub fn display_name(&self) -> &str {
        self.contact().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCalendarEvent {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}
