use crate::models::{CalendarEvent, CreateCalendarEvent, EventStatus};
use crate::services::store::RecordStore;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Calendar events that feed the event-reminder channel.
#[derive(Clone)]
pub struct CalendarService {
    store: Arc<dyn RecordStore>,
}

impl CalendarService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn schedule(
        &self,
        tenant_id: Uuid,
        input: CreateCalendarEvent,
    ) -> Result<CalendarEvent, AppError> {
        input.validate()?;

        let event = CalendarEvent::new(tenant_id, input);
        self.store.insert_event(&event).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            event_id = %event.event_id,
            scheduled_at = %event.scheduled_at,
            "Calendar event scheduled"
        );

        Ok(event)
    }

    pub async fn get(&self, tenant_id: Uuid, event_id: Uuid) -> Result<CalendarEvent, AppError> {
        self.store
            .find_event(tenant_id, event_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Calendar event {} not found", event_id))
            })
    }

    /// Move a scheduled event. The new time is a new reminder key, so the
    /// event is reminded again.
    pub async fn reschedule(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<CalendarEvent, AppError> {
        let mut event = self.get(tenant_id, event_id).await?;
        if event.status != EventStatus::Scheduled {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Calendar event {} is {}",
                event_id,
                event.status.as_str()
            )));
        }

        event.scheduled_at = scheduled_at;
        self.store.replace_event(&event).await?;
        Ok(event)
    }

    pub async fn complete(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
    ) -> Result<CalendarEvent, AppError> {
        self.transition(tenant_id, event_id, EventStatus::Completed)
            .await
    }

    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
    ) -> Result<CalendarEvent, AppError> {
        self.transition(tenant_id, event_id, EventStatus::Cancelled)
            .await
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        status: EventStatus,
    ) -> Result<CalendarEvent, AppError> {
        let mut event = self.get(tenant_id, event_id).await?;
        if event.status != EventStatus::Scheduled {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Calendar event {} is already {}",
                event_id,
                event.status.as_str()
            )));
        }

        event.status = status;
        self.store.replace_event(&event).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            event_id = %event_id,
            status = status.as_str(),
            "Calendar event status changed"
        );

        Ok(event)
    }
}
