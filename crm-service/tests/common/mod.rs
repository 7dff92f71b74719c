#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use crm_service::config::{
    CrmConfig, MongoConfig, ReminderConfig, SmtpConfig, StorageBackend, WhatsAppConfig,
};
use crm_service::models::{
    CalendarEvent, CreateCalendarEvent, CreateInvoice, Invoice, LivePayload, MonetaryInput,
    Notification,
};
use crm_service::scheduler::{ReminderSweeper, ReminderWindow};
use crm_service::services::{
    InMemoryStore, InsertOutcome, LiveSink, NotificationStore, RecordStore, ReminderSource,
};
use crm_service::startup::{AppState, Application};
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

pub fn test_config() -> CrmConfig {
    CrmConfig {
        common: CoreConfig {
            port: 0,
            log_level: "info".to_string(),
        },
        storage: StorageBackend::Memory,
        mongodb: MongoConfig {
            uri: String::new(),
            database: format!("crm_test_{}", Uuid::new_v4()),
        },
        smtp: SmtpConfig {
            host: "smtp.test.local".to_string(),
            port: 587,
            user: "test".to_string(),
            password: "test".to_string(),
            from_email: "test@example.com".to_string(),
            from_name: "Test Service".to_string(),
            enabled: false, // Use mock
        },
        whatsapp: WhatsAppConfig {
            api_base: "http://whatsapp.test.local".to_string(),
            phone_number_id: "1234".to_string(),
            access_token: "test-token".to_string(),
            enabled: false, // Use mock
        },
        reminder: ReminderConfig {
            // Tests drive sweeps by hand
            enabled: false,
            ..ReminderConfig::default()
        },
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let app = Application::build_with_store(test_config(), store.clone())
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);
        let state = app.state().clone();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            app.run_until_stopped(async {
                rx.await.ok();
            })
            .await
            .ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            state,
            store,
            shutdown: Some(tx),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// 2024-06-10T00:00 at +05:30, the due instant used across sweep tests.
pub fn due_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 9, 18, 30, 0).unwrap()
}

/// Raw UTC instant whose +05:30 shift reads 2024-06-09T12:00.
pub fn sweep_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 9, 6, 30, 0).unwrap()
}

pub fn invoice_draft(customer: &str, due_date: DateTime<Utc>) -> CreateInvoice {
    CreateInvoice {
        invoice_number: Some("INV-0042".to_string()),
        customer_name: customer.to_string(),
        company_name: None,
        email: Some("billing@example.com".to_string()),
        phone: Some("+91 98765 43210".to_string()),
        currency: None,
        amounts: MonetaryInput::new(Decimal::from(1000))
            .with_discount(Decimal::from(10))
            .with_gst(Decimal::from(18))
            .with_paid(Decimal::from(500)),
        status: None,
        due_date,
        notes: None,
    }
}

pub fn event_draft(title: &str, scheduled_at: DateTime<Utc>) -> CreateCalendarEvent {
    CreateCalendarEvent {
        title: title.to_string(),
        description: Some("Walk through the renewal".to_string()),
        contact_name: Some("Vikram Shah".to_string()),
        scheduled_at,
    }
}

pub async fn seed_invoice(store: &InMemoryStore, invoice: Invoice) -> Invoice {
    store
        .insert_invoice(&invoice)
        .await
        .expect("Failed to seed invoice");
    invoice
}

pub async fn seed_event(store: &InMemoryStore, event: CalendarEvent) -> CalendarEvent {
    store.insert_event(&event).await.expect("Failed to seed event");
    event
}

pub fn sweeper_over(
    source: Arc<dyn ReminderSource>,
    notifications: Arc<dyn NotificationStore>,
    sink: Arc<RecordingSink>,
) -> ReminderSweeper {
    ReminderSweeper::new(source, notifications, sink, ReminderWindow::default())
}

/// Due instant that is inside the reminder window relative to the real clock.
pub fn due_soon() -> DateTime<Utc> {
    Utc::now() + Duration::hours(2)
}

// =============================================================================
// Test doubles
// =============================================================================

/// Live sink that remembers every emit.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, LivePayload)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, LivePayload)> {
        self.events.lock().unwrap().clone()
    }
}

impl LiveSink for RecordingSink {
    fn emit(&self, channel: &str, payload: &LivePayload) {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.clone()));
    }
}

/// Source whose invoice and/or event queries fail.
pub struct FailingSource {
    pub inner: Arc<InMemoryStore>,
    pub fail_invoices: bool,
    pub fail_events: bool,
}

#[async_trait]
impl ReminderSource for FailingSource {
    async fn unpaid_invoices_due_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, AppError> {
        if self.fail_invoices {
            return Err(AppError::DatabaseError(anyhow::anyhow!("invoice query timed out")));
        }
        self.inner.unpaid_invoices_due_after(now).await
    }

    async fn scheduled_events_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        if self.fail_events {
            return Err(AppError::DatabaseError(anyhow::anyhow!("event query timed out")));
        }
        self.inner.scheduled_events_after(now).await
    }
}

/// Notification store that rejects inserts for one record and, optionally,
/// every `mark_sent`.
pub struct FlakyNotifications {
    pub inner: Arc<InMemoryStore>,
    pub fail_insert_for: Option<Uuid>,
    pub fail_mark_sent: bool,
}

#[async_trait]
impl NotificationStore for FlakyNotifications {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, AppError> {
        if self.fail_insert_for == Some(notification.related_event_id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("write concern failed")));
        }
        self.inner.insert_notification(notification).await
    }

    async fn mark_sent(&self, notification_id: Uuid) -> Result<(), AppError> {
        if self.fail_mark_sent {
            return Err(AppError::DatabaseError(anyhow::anyhow!("update failed")));
        }
        self.inner.mark_sent(notification_id).await
    }

    async fn list_for_related(
        &self,
        related_event_id: Uuid,
    ) -> Result<Vec<Notification>, AppError> {
        self.inner.list_for_related(related_event_id).await
    }
}
