use crate::scheduler::sweeper::ReminderSweeper;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A background job that runs on a fixed period until stopped.
pub trait PeriodicTask: Send + Sync {
    /// Spawn the loop. Returns `false` if it was already running.
    fn start(&self) -> bool;

    /// Request a stop. A sweep already in progress finishes first.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives `ReminderSweeper` on a tokio interval. Ticks that fall behind are
/// delayed, and sweeps never overlap.
pub struct ReminderScheduler {
    sweeper: Arc<ReminderSweeper>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl ReminderScheduler {
    pub fn new(sweeper: Arc<ReminderSweeper>, period: Duration) -> Self {
        Self {
            sweeper,
            period,
            running: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(&self) {
        let running = self.lock().take();
        if let Some(running) = running {
            running.token.cancel();
            if let Err(e) = running.handle.await {
                tracing::error!(error = %e, "Reminder scheduler task ended abnormally");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PeriodicTask for ReminderScheduler {
    fn start(&self) -> bool {
        let mut running = self.lock();
        if running
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
        {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.sweeper.clone(),
            self.period,
            token.clone(),
        ));

        tracing::info!(
            period_secs = self.period.as_secs(),
            "Reminder scheduler started"
        );

        *running = Some(Running { token, handle });
        true
    }

    fn stop(&self) {
        if let Some(running) = self.lock().take() {
            running.token.cancel();
            tracing::info!("Reminder scheduler stop requested");
        }
    }

    fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            running.token.cancel();
        }
    }
}

async fn run_loop(sweeper: Arc<ReminderSweeper>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("Reminder scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {
                let dispatched = sweeper.sweep(Utc::now()).await;
                if !dispatched.is_empty() {
                    tracing::info!(dispatched = dispatched.len(), "Reminder tick complete");
                }
            }
        }
    }
}
