//! In-process store for local runs (`CRM_STORAGE=memory`) and tests.
//!
//! Same contracts as `CrmDb`, including the one-reminder-per-due-date rule.

use crate::models::{CalendarEvent, EventStatus, Invoice, InvoiceStatus, Notification};
use crate::services::store::{InsertOutcome, NotificationStore, RecordStore, ReminderSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    invoices: RwLock<HashMap<Uuid, Invoice>>,
    events: RwLock<HashMap<Uuid, CalendarEvent>>,
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored notification, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl ReminderSource for InMemoryStore {
    async fn unpaid_invoices_due_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .filter(|invoice| invoice.status == InvoiceStatus::Unpaid && invoice.due_date > now)
            .cloned()
            .collect();
        invoices.sort_by_key(|invoice| invoice.due_date);
        Ok(invoices)
    }

    async fn scheduled_events_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let mut events: Vec<CalendarEvent> = self
            .events
            .read()
            .await
            .values()
            .filter(|event| event.status == EventStatus::Scheduled && event.scheduled_at > now)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.scheduled_at);
        Ok(events)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, AppError> {
        let mut notifications = self.notifications.write().await;
        let key = notification.dedup_key();

        if notifications.iter().any(|existing| existing.dedup_key() == key) {
            return Ok(InsertOutcome::Duplicate);
        }

        notifications.push(notification.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn mark_sent(&self, notification_id: Uuid) -> Result<(), AppError> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .iter_mut()
            .find(|n| n.notification_id == notification_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Notification {} not found",
                    notification_id
                ))
            })?;

        notification.mark_sent();
        Ok(())
    }

    async fn list_for_related(
        &self,
        related_event_id: Uuid,
    ) -> Result<Vec<Notification>, AppError> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.related_event_id == related_event_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(notifications)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut invoices = self.invoices.write().await;
        if invoices.contains_key(&invoice.invoice_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} already exists",
                invoice.invoice_id
            )));
        }
        invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }

    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .read()
            .await
            .get(&invoice_id)
            .filter(|invoice| invoice.tenant_id == tenant_id)
            .cloned())
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut invoices = self.invoices.write().await;
        match invoices.get_mut(&invoice.invoice_id) {
            Some(existing) if existing.tenant_id == invoice.tenant_id => {
                *existing = invoice.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound(anyhow::anyhow!(
                "Invoice {} not found",
                invoice.invoice_id
            ))),
        }
    }

    async fn insert_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.event_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Calendar event {} already exists",
                event.event_id
            )));
        }
        events.insert(event.event_id, event.clone());
        Ok(())
    }

    async fn find_event(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Option<CalendarEvent>, AppError> {
        Ok(self
            .events
            .read()
            .await
            .get(&event_id)
            .filter(|event| event.tenant_id == tenant_id)
            .cloned())
    }

    async fn replace_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let mut events = self.events.write().await;
        match events.get_mut(&event.event_id) {
            Some(existing) if existing.tenant_id == event.tenant_id => {
                *existing = event.clone();
                Ok(())
            }
            _ => Err(AppError::NotFound(anyhow::anyhow!(
                "Calendar event {} not found",
                event.event_id
            ))),
        }
    }
}
