//! Periodic ingestion scheduler.
//!
//! Fires a cycle immediately on start and then once per interval. Manual
//! triggers go through a broadcast channel. Cycles run as separate tasks,
//! so a trigger that arrives while a cycle is in flight reaches the job's
//! run lock and is skipped instead of queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::job::IngestionJob;

/// Drives [`IngestionJob`] on a fixed interval.
pub struct IngestScheduler {
    job: Arc<IngestionJob>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    trigger: broadcast::Sender<()>,
}

impl IngestScheduler {
    pub fn new(job: Arc<IngestionJob>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (trigger, _) = broadcast::channel(16);
        Self {
            job,
            interval,
            shutdown,
            trigger,
        }
    }

    /// Requests an out-of-schedule cycle.
    pub fn trigger(&self) {
        if self.trigger.send(()).is_err() {
            log::debug!("Manual trigger ignored: scheduler not running");
        }
    }

    /// Start the scheduling loop on the current tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let job = Arc::clone(&self.job);
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut trigger_rx = self.trigger.subscribe();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cycles: JoinSet<()> = JoinSet::new();

            log::info!("Ingestion scheduler started (interval {:?})", interval);

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                        if let Err(e) = joined {
                            log::error!("Ingestion cycle task failed: {}", e);
                        }
                        continue;
                    }
                    _ = timer.tick() => {
                        log::debug!("Scheduled ingestion cycle");
                    }
                    received = trigger_rx.recv() => match received {
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            log::info!("Manual ingestion cycle triggered");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                let job = Arc::clone(&job);
                let cycle_shutdown = shutdown_rx.clone();
                cycles.spawn(async move {
                    job.run_cycle(&cycle_shutdown).await;
                });
            }

            if !cycles.is_empty() {
                log::info!("Waiting for in-flight ingestion cycle to finish");
            }
            while let Some(joined) = cycles.join_next().await {
                if let Err(e) = joined {
                    log::error!("Ingestion cycle task failed: {}", e);
                }
            }

            log::info!("Ingestion scheduler stopped");
        })
    }

    /// Stops scheduling, signals in-flight cycles to stop between messages
    /// and waits for them to close their sessions.
    pub async fn shutdown(&self, handle: JoinHandle<()>) {
        self.shutdown.send_replace(true);
        if let Err(e) = handle.await {
            log::error!("Ingestion scheduler task failed: {}", e);
        }
    }
}
