//! What the reminder pipeline needs to know about a record.

use crate::models::{CalendarEvent, Invoice, NotificationType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Independent reminder streams swept on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderChannel {
    InvoiceDue,
    CalendarDue,
}

impl ReminderChannel {
    pub const ALL: [ReminderChannel; 2] =
        [ReminderChannel::InvoiceDue, ReminderChannel::CalendarDue];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderChannel::InvoiceDue => "invoice_due",
            ReminderChannel::CalendarDue => "calendar_due",
        }
    }

    /// Name of the live-push channel listeners subscribe to.
    pub fn live_channel(&self) -> &'static str {
        match self {
            ReminderChannel::InvoiceDue => "invoice-reminder",
            ReminderChannel::CalendarDue => "event-reminder",
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            ReminderChannel::InvoiceDue => NotificationType::InvoiceDue,
            ReminderChannel::CalendarDue => NotificationType::EventReminder,
        }
    }
}

impl std::fmt::Display for ReminderChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The channel-specific part of a reminder.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderDetail {
    Amount { amount: Decimal, currency: String },
    Event {
        title: String,
        contact: Option<String>,
    },
}

/// A record that can fall due: an unpaid invoice or a scheduled event.
pub trait Reminderable: Send + Sync {
    fn record_id(&self) -> Uuid;
    fn tenant_id(&self) -> Uuid;
    fn due_at(&self) -> DateTime<Utc>;
    fn display_title(&self) -> String;
    fn channel(&self) -> ReminderChannel;
    fn detail(&self) -> ReminderDetail;
}

impl Reminderable for Invoice {
    fn record_id(&self) -> Uuid {
        self.invoice_id
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn due_at(&self) -> DateTime<Utc> {
        self.due_date
    }

    fn display_title(&self) -> String {
        self.display_name()
    }

    fn channel(&self) -> ReminderChannel {
        ReminderChannel::InvoiceDue
    }

    fn detail(&self) -> ReminderDetail {
        ReminderDetail::Amount {
            amount: self.remaining_amount(),
            currency: self.currency.clone(),
        }
    }
}

impl Reminderable for CalendarEvent {
    fn record_id(&self) -> Uuid {
        self.event_id
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn due_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    fn display_title(&self) -> String {
        self.display_name().to_string()
    }

    fn channel(&self) -> ReminderChannel {
        ReminderChannel::CalendarDue
    }

    fn detail(&self) -> ReminderDetail {
        ReminderDetail::Event {
            title: self.title.clone(),
            contact: self.contact().map(str::to_string),
        }
    }
}

/// Due dates are shown as the ISO date of the UTC instant.
pub fn format_due_date(due: DateTime<Utc>) -> String {
    due.format("%Y-%m-%d").to_string()
}

/// Title and body shared by scheduled and manually triggered reminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderContent {
    pub title: String,
    pub message: String,
}

impl ReminderContent {
    pub fn for_record(record: &dyn Reminderable) -> Self {
        let name = record.display_title();
        let due = format_due_date(record.due_at());

        match record.detail() {
            ReminderDetail::Amount { amount, currency } => Self {
                title: format!("Payment reminder: {}", name),
                message: format!(
                    "Invoice for {} of {} {} is due on {}.",
                    name,
                    currency,
                    amount.round_dp(2),
                    due
                ),
            },
            ReminderDetail::Event { title, contact } => Self {
                message: match contact {
                    Some(contact) => {
                        format!("{} with {} is scheduled for {}.", title, contact, due)
                    }
                    None => format!("{} is scheduled for {}.", title, due),
                },
                title: format!("Upcoming event: {}", title),
            },
        }
    }
}

/// Body of a live-push event. Invoices carry `amount`, events `eventTitle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePayload {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
    pub due_date: String,
}

impl LivePayload {
    pub fn for_record(record: &dyn Reminderable) -> Self {
        let (amount, event_title) = match record.detail() {
            ReminderDetail::Amount { amount, .. } => (Some(amount), None),
            ReminderDetail::Event { title, .. } => (None, Some(title)),
        };

        Self {
            id: record.record_id(),
            display_name: record.display_title(),
            amount,
            event_title,
            due_date: format_due_date(record.due_at()),
        }
    }
}
