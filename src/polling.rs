use crate::sampler::MetricSampler;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Receives every snapshot that survives the visibility check.
#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self, snapshot: Snapshot);
}

/// Repeats `sample()` on a fixed interval while the dashboard is visible.
pub struct PollingController {
    interval: Duration,
    visible: Arc<AtomicBool>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PollingController {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            visible: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Samples and delivers once right away, then keeps ticking every
    /// interval. A no-op while already running.
    pub async fn start(&mut self, sampler: Arc<MetricSampler>, handler: Arc<dyn TickHandler>) {
        if self.is_running() {
            debug!("polling already running");
            return;
        }

        // A fresh flag per run: samples still in flight from an earlier run
        // keep observing their own, already cleared, flag.
        let visible = Arc::new(AtomicBool::new(true));
        self.visible = visible.clone();

        let first = sampler.sample().await;
        if !visible.load(Ordering::Acquire) {
            return;
        }
        handler.on_tick(first).await;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("polling loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !visible.load(Ordering::Acquire) {
                            continue;
                        }
                        let snapshot = sampler.sample().await;
                        if !visible.load(Ordering::Acquire) {
                            debug!("dropping sample finished after the dashboard was hidden");
                            continue;
                        }
                        handler.on_tick(snapshot).await;
                    }
                }
            }
        });

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        debug!(interval = %humantime::format_duration(interval), "polling started");
    }

    /// Hides and cancels the timer. Returns `false` when nothing was running.
    /// An in-flight sample is left to finish and is then discarded.
    pub fn stop(&mut self) -> bool {
        self.visible.store(false, Ordering::Release);
        let Some(shutdown) = self.shutdown.take() else {
            return false;
        };
        let _ = shutdown.send(true);
        self.task.take();
        true
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}
