use crm_service::config::CrmConfig;
use crm_service::services::init_metrics;
use crm_service::startup::Application;
use service_core::config::Config as CoreConfig;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    // A broken core config is reported by CrmConfig::load below
    let log_level = CoreConfig::load()
        .map(|core| core.log_level)
        .unwrap_or_else(|_| "info".to_string());
    init_tracing("crm-service", &log_level, otlp_endpoint.as_deref());

    if let Err(e) = init_metrics() {
        tracing::error!("Failed to initialize metrics: {}", e);
    }

    let config = CrmConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    tracing::info!(
        storage = ?config.storage,
        log_level = %config.common.log_level,
        reminder_interval_secs = config.reminder.interval_secs,
        display_offset_minutes = config.reminder.display_offset_minutes,
        "Starting crm-service"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped(shutdown_signal()).await
}
