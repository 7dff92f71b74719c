//! Application startup and lifecycle management.
//!
//! Wires the store, providers, live channel and reminder scheduler together
//! and serves the probe and live-event endpoints.

use crate::config::{CrmConfig, SmtpConfig, StorageBackend, WhatsAppConfig};
use crate::models::LivePayload;
use crate::scheduler::{PeriodicTask, ReminderScheduler, ReminderSweeper, ReminderWindow};
use crate::services::{
    get_metrics, CalendarService, CloudApiWhatsApp, CrmDb, InMemoryStore, InvoiceService,
    LiveChannel, LiveEvent, MailSender, ManualReminderService, MockMailer, MockWhatsApp,
    NotificationStore, RecordStore, SmtpMailer, WhatsAppSender,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use service_core::error::AppError;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: CrmConfig,
    pub records: Arc<dyn RecordStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub live: LiveChannel,
    pub invoices: InvoiceService,
    pub calendar: CalendarService,
    pub manual_reminders: ManualReminderService,
    pub sweeper: Arc<ReminderSweeper>,
    /// Cancelled on shutdown so open live-event streams end.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new<S>(
        config: CrmConfig,
        store: Arc<S>,
        mailer: Arc<dyn MailSender>,
        whatsapp: Arc<dyn WhatsAppSender>,
    ) -> Self
    where
        S: RecordStore + NotificationStore + 'static,
    {
        let records: Arc<dyn RecordStore> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store.clone();
        let live = LiveChannel::new(config.reminder.live_channel_capacity);

        let sweeper = Arc::new(ReminderSweeper::new(
            store,
            notifications.clone(),
            Arc::new(live.clone()),
            ReminderWindow::from_config(&config.reminder),
        ));

        Self {
            invoices: InvoiceService::new(records.clone()),
            calendar: CalendarService::new(records.clone()),
            manual_reminders: ManualReminderService::new(mailer, whatsapp),
            config,
            records,
            notifications,
            live,
            sweeper,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Liveness probe; also reports store connectivity.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.records.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "crm-service",
                "version": env!("CARGO_PKG_VERSION"),
                "live_listeners": state.live.listener_count()
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "crm-service",
                "error": e.to_string()
            })),
        ),
    }
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.records.ping().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Server-sent events: one SSE event per reminder push, named after the
/// live channel, with the JSON payload as data.
async fn live_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(
        listeners = state.live.listener_count() + 1,
        "Live listener connected"
    );

    let stream = BroadcastStream::new(state.live.subscribe())
        .filter_map(|message| async move { to_sse_event(message) })
        .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(
    message: Result<LiveEvent, BroadcastStreamRecvError>,
) -> Option<Result<Event, Infallible>> {
    match message {
        Ok(LiveEvent { channel, payload }) => match sse_event(&channel, &payload) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Failed to encode live event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Live listener lagged, events dropped");
            None
        }
    }
}

fn sse_event(channel: &str, payload: &LivePayload) -> Result<Event, axum::Error> {
    Event::default().event(channel).json_data(payload)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/events", get(live_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_mailer(config: &SmtpConfig) -> Arc<dyn MailSender> {
    if !config.enabled {
        tracing::info!("SMTP provider disabled, using mock mailer");
        return Arc::new(MockMailer::new(true));
    }

    match SmtpMailer::new(config) {
        Ok(mailer) => {
            tracing::info!("SMTP mailer initialized");
            Arc::new(mailer)
        }
        Err(e) => {
            tracing::warn!("Failed to initialize SMTP mailer: {}. Using mock.", e);
            Arc::new(MockMailer::new(true))
        }
    }
}

fn build_whatsapp(config: &WhatsAppConfig) -> Arc<dyn WhatsAppSender> {
    if config.enabled {
        tracing::info!("WhatsApp Cloud API sender initialized");
        Arc::new(CloudApiWhatsApp::new(config.clone()))
    } else {
        tracing::info!("WhatsApp provider disabled, using mock sender");
        Arc::new(MockWhatsApp::new(true))
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    scheduler: Arc<ReminderScheduler>,
}

impl Application {
    /// Build against the store selected by `config.storage`.
    pub async fn build(config: CrmConfig) -> Result<Self, AppError> {
        match config.storage {
            StorageBackend::Mongo => {
                let db = CrmDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Self::build_with_store(config, Arc::new(db)).await
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Self::build_with_store(config, Arc::new(InMemoryStore::new())).await
            }
        }
    }

    pub async fn build_with_store<S>(config: CrmConfig, store: Arc<S>) -> Result<Self, AppError>
    where
        S: RecordStore + NotificationStore + 'static,
    {
        let mailer = build_mailer(&config.smtp);
        let whatsapp = build_whatsapp(&config.whatsapp);
        let state = AppState::new(config.clone(), store, mailer, whatsapp);

        let scheduler = Arc::new(ReminderScheduler::new(
            state.sweeper.clone(),
            config.reminder.interval(),
        ));

        // Port 0 binds a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("crm-service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            scheduler,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler(&self) -> Arc<ReminderScheduler> {
        self.scheduler.clone()
    }

    /// Serve until `shutdown` resolves, then stop the scheduler and end
    /// open live-event streams.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.state.config.reminder.enabled {
            self.scheduler.start();
        } else {
            tracing::info!("Reminder scheduler disabled by configuration");
        }

        let token = self.state.shutdown.clone();
        let app = router(self.state);

        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                token.cancel();
            })
            .await;

        self.scheduler.shutdown().await;

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}
