//! Storage seams used by the invoice services and the reminder scheduler.

use crate::models::{CalendarEvent, Invoice, Notification};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

/// Result of inserting a reminder notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A notification for the same record and due date already exists.
    Duplicate,
}

/// Candidate records for the reminder sweep.
#[async_trait]
pub trait ReminderSource: Send + Sync {
    /// Unpaid invoices due strictly after `now`, earliest first.
    async fn unpaid_invoices_due_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, AppError>;

    /// Scheduled calendar events strictly after `now`, earliest first.
    async fn scheduled_events_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AppError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert unless a notification with the same
    /// (`related_event_id`, `scheduled_at`) exists.
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, AppError>;

    /// Set `is_sent`. No-op for an already sent notification.
    async fn mark_sent(&self, notification_id: Uuid) -> Result<(), AppError>;

    async fn list_for_related(&self, related_event_id: Uuid)
        -> Result<Vec<Notification>, AppError>;
}

/// Invoice and calendar persistence.
#[async_trait]
pub trait RecordStore: ReminderSource {
    async fn ping(&self) -> Result<(), AppError>;

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>;

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn insert_event(&self, event: &CalendarEvent) -> Result<(), AppError>;

    async fn find_event(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Option<CalendarEvent>, AppError>;

    async fn replace_event(&self, event: &CalendarEvent) -> Result<(), AppError>;
}
