use crate::models::{LivePayload, Notification, ReminderChannel, ReminderContent, Reminderable};
use crate::scheduler::window::ReminderWindow;
use crate::services::live::LiveSink;
use crate::services::metrics::{record_dispatch, record_duplicate, record_failure, record_sweep};
use crate::services::store::{InsertOutcome, NotificationStore, ReminderSource};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to fetch {channel} candidates: {source}")]
    Fetch {
        channel: ReminderChannel,
        #[source]
        source: AppError,
    },

    #[error("failed to dispatch reminder for {record_id}: {source}")]
    Dispatch {
        record_id: Uuid,
        #[source]
        source: AppError,
    },
}

/// A reminder that was persisted and pushed during a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedNotification {
    pub notification_id: Uuid,
    pub channel: ReminderChannel,
    pub related_event_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub payload: LivePayload,
}

/// One pass over every reminder channel.
pub struct ReminderSweeper {
    source: Arc<dyn ReminderSource>,
    notifications: Arc<dyn NotificationStore>,
    live: Arc<dyn LiveSink>,
    window: ReminderWindow,
}

impl ReminderSweeper {
    pub fn new(
        source: Arc<dyn ReminderSource>,
        notifications: Arc<dyn NotificationStore>,
        live: Arc<dyn LiveSink>,
        window: ReminderWindow,
    ) -> Self {
        Self {
            source,
            notifications,
            live,
            window,
        }
    }

    pub fn window(&self) -> ReminderWindow {
        self.window
    }

    /// Run every channel against `now`. A failed fetch ends that channel
    /// only; a failed record is logged and skipped.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<DispatchedNotification> {
        let started = Instant::now();
        let mut dispatched = Vec::new();

        for channel in ReminderChannel::ALL {
            match self.sweep_channel(channel, now).await {
                Ok(mut sent) => dispatched.append(&mut sent),
                Err(e) => {
                    record_failure("fetch", channel.as_str());
                    tracing::warn!(
                        channel = %channel,
                        error = %e,
                        "Reminder candidates unavailable, skipping channel this tick"
                    );
                }
            }
        }

        record_sweep(started.elapsed().as_secs_f64(), dispatched.len());
        tracing::debug!(
            dispatched = dispatched.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Reminder sweep finished"
        );

        dispatched
    }

    async fn sweep_channel(
        &self,
        channel: ReminderChannel,
        now: DateTime<Utc>,
    ) -> Result<Vec<DispatchedNotification>, SweepError> {
        let candidates = self.candidates(channel, now).await?;
        let mut dispatched = Vec::new();

        for record in candidates
            .iter()
            .filter(|record| self.window.is_due(record.due_at(), now))
        {
            match self.dispatch(&**record).await {
                Ok(Some(sent)) => dispatched.push(sent),
                Ok(None) => {}
                Err(e) => {
                    record_failure("dispatch", channel.as_str());
                    tracing::error!(
                        channel = %channel,
                        record_id = %record.record_id(),
                        error = %e,
                        "Reminder dispatch failed"
                    );
                }
            }
        }

        Ok(dispatched)
    }

    async fn candidates(
        &self,
        channel: ReminderChannel,
        now: DateTime<Utc>,
    ) -> Result<Vec<Box<dyn Reminderable>>, SweepError> {
        let fetched = match channel {
            ReminderChannel::InvoiceDue => self
                .source
                .unpaid_invoices_due_after(now)
                .await
                .map(boxed),
            ReminderChannel::CalendarDue => {
                self.source.scheduled_events_after(now).await.map(boxed)
            }
        };

        fetched.map_err(|source| SweepError::Fetch { channel, source })
    }

    /// Insert, push, mark sent. `None` when this due date was already
    /// reminded.
    async fn dispatch(
        &self,
        record: &dyn Reminderable,
    ) -> Result<Option<DispatchedNotification>, SweepError> {
        let channel = record.channel();
        let record_id = record.record_id();
        let content = ReminderContent::for_record(record);

        let notification = Notification::new(
            record.tenant_id(),
            channel.notification_type(),
            content.title,
            content.message,
            record.due_at(),
            record_id,
        );

        let outcome = self
            .notifications
            .insert_notification(&notification)
            .await
            .map_err(|source| SweepError::Dispatch { record_id, source })?;

        if outcome == InsertOutcome::Duplicate {
            record_duplicate(channel.as_str());
            tracing::debug!(
                channel = %channel,
                record_id = %record_id,
                "Reminder already sent for this due date"
            );
            return Ok(None);
        }

        let payload = LivePayload::for_record(record);
        self.live.emit(channel.live_channel(), &payload);

        self.notifications
            .mark_sent(notification.notification_id)
            .await
            .map_err(|source| SweepError::Dispatch { record_id, source })?;

        record_dispatch(channel.as_str());
        tracing::info!(
            channel = %channel,
            tenant_id = %notification.tenant_id,
            record_id = %record_id,
            notification_id = %notification.notification_id,
            due_date = %payload.due_date,
            "Reminder dispatched"
        );

        Ok(Some(DispatchedNotification {
            notification_id: notification.notification_id,
            channel,
            related_event_id: record_id,
            scheduled_at: notification.scheduled_at,
            payload,
        }))
    }
}

fn boxed<T: Reminderable + 'static>(records: Vec<T>) -> Vec<Box<dyn Reminderable>> {
    records
        .into_iter()
        .map(|record| Box::new(record) as Box<dyn Reminderable>)
        .collect()
}
