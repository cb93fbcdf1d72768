//! Background task that drains the deferred queue and emits due digests.

use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

use crate::state::AppState;

/// Configuration for the drain task.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Seconds between drain runs (default: 60).
    pub interval_secs: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl DrainConfig {
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    /// Reads `VIGIL_DRAIN_INTERVAL_SECS` (default: 60).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(secs) = std::env::var("VIGIL_DRAIN_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config = config.with_interval(secs);
            }
        }
        config
    }
}

/// One drain pass: retry deferred signals, then emit a digest if one is due.
pub fn run_once(state: &AppState) {
    let engine = state.engine();
    let report = engine.process_queue();
    if !report.delivered.is_empty() {
        info!(delivered = report.delivered.len(), remaining = report.remaining, "Deferred signals delivered");
    }
    if let Some(digest) = engine.take_digest(false) {
        if !digest.is_empty() {
            info!(signals = digest.signals.len(), "Scheduled digest delivered");
        }
    }
}

/// Runs [`run_once`] on a fixed interval.
///
/// Call `start()` to begin and `shutdown()` to stop.
pub struct DrainScheduler {
    scheduler: JobScheduler,
    state: AppState,
    config: DrainConfig,
}

impl DrainScheduler {
    pub async fn new(state: AppState, config: DrainConfig) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            state,
            config,
        })
    }

    pub fn config(&self) -> &DrainConfig {
        &self.config
    }

    /// Register the repeated drain job and start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let state = self.state.clone();
        let period = Duration::from_secs(self.config.interval_secs.max(1));

        let job = Job::new_repeated_async(period, move |_uuid, _lock| {
            let state = state.clone();
            Box::pin(async move {
                debug!("Starting queue drain");
                // The engine does blocking storage I/O.
                if let Err(e) = tokio::task::spawn_blocking(move || run_once(&state)).await {
                    error!(error = %e, "Queue drain failed");
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        info!(interval_secs = self.config.interval_secs, "Drain scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        info!("Shutting down drain scheduler");
        self.scheduler.shutdown().await
    }

    /// Drain now, outside the schedule.
    pub fn run_now(&self) {
        run_once(&self.state);
    }
}
