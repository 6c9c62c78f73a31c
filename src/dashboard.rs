use crate::collectors::HostProbe;
use crate::gate::EnvironmentGate;
use crate::history::{AnalyticsSummary, HistoryBuffer, Insight};
use crate::polling::{PollingController, TickHandler};
use crate::sampler::MetricSampler;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Everything a display needs for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub snapshot: Snapshot,
    pub analytics: Insight<AnalyticsSummary>,
}

/// The display side of the dashboard. Implementations only draw; they never
/// feed anything back into sampling.
pub trait Presenter: Send + Sync {
    fn show_trigger(&self);
    fn hide_trigger(&self);
    fn render(&self, view: &DashboardView);
    fn hide(&self);
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub interval: Duration,
    pub query_timeout: Duration,
    pub history_capacity: usize,
    pub trend_window: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            interval: crate::polling::DEFAULT_INTERVAL,
            query_timeout: Duration::from_millis(1000),
            history_capacity: crate::history::DEFAULT_CAPACITY,
            trend_window: crate::history::DEFAULT_TREND_WINDOW,
        }
    }
}

struct DashboardState {
    history: HistoryBuffer,
    latest: Option<DashboardView>,
}

/// Records each delivered snapshot and forwards the resulting view.
struct ViewFeed {
    state: Arc<RwLock<DashboardState>>,
    presenter: Option<Arc<dyn Presenter>>,
    trend_window: usize,
}

#[async_trait]
impl TickHandler for ViewFeed {
    async fn on_tick(&self, snapshot: Snapshot) {
        let view = {
            let mut guard = self.state.write().await;
            guard.history.record(&snapshot);
            let view = DashboardView {
                analytics: guard.history.summary(self.trend_window),
                snapshot,
            };
            guard.latest = Some(view.clone());
            view
        };
        match &self.presenter {
            Some(presenter) => presenter.render(&view),
            None => debug!("no display target, skipping render"),
        }
    }
}

/// Host-owned dashboard: construct it, `open`/`close` it, drop it.
pub struct Dashboard {
    gate: EnvironmentGate,
    sampler: Arc<MetricSampler>,
    state: Arc<RwLock<DashboardState>>,
    poller: PollingController,
    presenter: Option<Arc<dyn Presenter>>,
    trend_window: usize,
    open: bool,
}

impl Dashboard {
    pub fn new(
        gate: EnvironmentGate,
        probe: Arc<dyn HostProbe>,
        presenter: Option<Arc<dyn Presenter>>,
        options: DashboardOptions,
    ) -> Self {
        let dashboard = Self {
            gate,
            sampler: Arc::new(MetricSampler::new(probe, options.query_timeout)),
            state: Arc::new(RwLock::new(DashboardState {
                history: HistoryBuffer::new(options.history_capacity),
                latest: None,
            })),
            poller: PollingController::new(options.interval),
            presenter,
            trend_window: options.trend_window,
            open: false,
        };
        if dashboard.gate.is_enabled() {
            info!(reason = ?dashboard.gate.reason(), "development context detected, dashboard enabled");
            dashboard.with_presenter(|p| p.show_trigger());
        } else {
            info!("production context, dashboard disabled");
        }
        dashboard
    }

    fn with_presenter(&self, f: impl FnOnce(&dyn Presenter)) {
        if let Some(presenter) = &self.presenter {
            f(presenter.as_ref());
        }
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Takes the first sample, renders it and starts polling. Returns `false`
    /// without doing anything when the dashboard is not active.
    pub async fn open(&mut self) -> bool {
        if !self.is_active() {
            debug!("open ignored, dashboard disabled");
            return false;
        }
        if self.open {
            return true;
        }
        let feed = Arc::new(ViewFeed {
            state: self.state.clone(),
            presenter: self.presenter.clone(),
            trend_window: self.trend_window,
        });
        self.poller.start(self.sampler.clone(), feed).await;
        self.open = true;
        info!(
            interval = %humantime::format_duration(self.poller.interval()),
            "dashboard opened"
        );
        true
    }

    pub fn close(&mut self) {
        let stopped = self.poller.stop();
        if self.open {
            self.open = false;
            self.with_presenter(|p| p.hide());
            info!(timer_cancelled = stopped, "dashboard closed");
        }
    }

    /// Overrides the environment decision for the rest of the process.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gate.set_enabled(enabled);
        if enabled {
            self.with_presenter(|p| p.show_trigger());
        } else {
            self.close();
            self.with_presenter(|p| p.hide_trigger());
        }
        info!(enabled, "dashboard override set");
    }

    pub async fn latest(&self) -> Option<DashboardView> {
        self.state.read().await.latest.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.close();
    }
}
