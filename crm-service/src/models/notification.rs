use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, uuid_1_as_binary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    InvoiceDue,
    EventReminder,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::InvoiceDue => write!(f, "invoice_due"),
            NotificationType::EventReminder => write!(f, "event_reminder"),
        }
    }
}

/// Persisted reminder. At most one exists per
/// (`related_event_id`, `scheduled_at`); `is_sent` only ever goes
/// false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub notification_id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub tenant_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(with = "uuid_1_as_binary")]
    pub related_event_id: Uuid,
    pub is_sent: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_chrono_datetime_as_bson_datetime"
    )]
    pub sent_utc: Option<DateTime<Utc>>,
}

// Helper module for optional DateTime<Utc> as BSON DateTime
mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}

impl Notification {
    pub fn new(
        tenant_id: Uuid,
        notification_type: NotificationType,
        title: String,
        message: String,
        scheduled_at: DateTime<Utc>,
        related_event_id: Uuid,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            tenant_id,
            title,
            message,
            notification_type,
            created_utc: Utc::now(),
            scheduled_at,
            related_event_id,
            is_sent: false,
            sent_utc: None,
        }
    }

    /// Flip to sent. A second call keeps the first timestamp.
    pub fn mark_sent(&mut self) {
        if !self.is_sent {
            self.is_sent = true;
            self.sent_utc = Some(Utc::now());
        }
    }

    /// Key used to de-duplicate reminders for the same record and due date.
    pub fn dedup_key(&self) -> (Uuid, DateTime<Utc>) {
        (self.related_event_id, self.scheduled_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unsent_and_marks_sent_once() {
        let mut notification = Notification::new(
            Uuid::new_v4(),
            NotificationType::InvoiceDue,
            "Invoice due".to_string(),
            "body".to_string(),
            Utc::now(),
            Uuid::new_v4(),
        );
        assert!(!notification.is_sent);
        assert!(notification.sent_utc.is_none());

        notification.mark_sent();
        let first = notification.sent_utc;
        assert!(notification.is_sent);

        notification.mark_sent();
        assert_eq!(notification.sent_utc, first);
    }
}
