// RpaDeck — Session monitor (health, stream availability, screenshot polling)

use crate::backend::{AutomationBackend, BackendError, BrowserCommand};
use crate::config::MonitorConfig;
use crate::metrics::{Metrics, ProbeKind};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// What the remote browser view currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    Disconnected,
    ConnectedStreaming,
    ConnectedPolling,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionMode::Disconnected => "disconnected",
            SessionMode::ConnectedStreaming => "live stream",
            SessionMode::ConnectedPolling => "screenshot polling",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub connected: bool,
    pub stream_url: Option<String>,
    pub screenshot: Option<String>,
    pub url: Option<String>,
    pub is_loading: bool,
}

impl SessionState {
    pub fn mode(&self) -> SessionMode {
        if self.stream_url.is_some() {
            SessionMode::ConnectedStreaming
        } else if self.connected {
            SessionMode::ConnectedPolling
        } else {
            SessionMode::Disconnected
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorIntervals {
    pub health: Duration,
    pub stream_probe: Duration,
    pub screenshot: Duration,
}

impl Default for MonitorIntervals {
    fn default() -> Self {
        (&MonitorConfig::default()).into()
    }
}

impl From<&MonitorConfig> for MonitorIntervals {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            health: cfg.health_interval(),
            stream_probe: cfg.stream_probe_interval(),
            screenshot: cfg.screenshot_interval(),
        }
    }
}

/// Owns the session state. Each probe writes only the fields it is
/// responsible for, so concurrent loops never clobber each other.
pub struct SessionMonitor {
    backend: Arc<dyn AutomationBackend>,
    state: watch::Sender<SessionState>,
    /// Set once a health probe has answered; from then on only health
    /// probes write `connected`.
    health_reported: AtomicBool,
    intervals: MonitorIntervals,
    metrics: Metrics,
}

impl SessionMonitor {
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        intervals: MonitorIntervals,
        metrics: Metrics,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            backend,
            state,
            health_reported: AtomicBool::new(false),
            intervals,
            metrics,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Read-only view that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Mark a user-visible load in progress (cleared by `reset`).
    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|s| replace(&mut s.is_loading, loading));
    }

    /// Until the first health probe answers, any stream answer marks the
    /// backend reachable. A non-empty stream URL is kept for the life of the
    /// monitor and never cleared by a later empty answer.
    pub async fn probe_stream(&self) {
        match self.backend.stream_info().await {
            Ok(info) => {
                self.metrics.record_probe(ProbeKind::Stream, true).await;
                let live = info.live_url().map(String::from);
                self.state.send_if_modified(|s| {
                    let mut changed = !self.health_reported.load(Ordering::SeqCst)
                        && replace(&mut s.connected, true);
                    if let Some(url) = live {
                        if s.stream_url.as_deref() != Some(url.as_str()) {
                            tracing::info!(stream_url = %url, "Live browser stream available");
                            s.stream_url = Some(url);
                            changed = true;
                        }
                    }
                    changed
                });
            }
            Err(e) => {
                self.metrics.record_probe(ProbeKind::Stream, false).await;
                tracing::debug!(error = %e, "Stream probe failed");
            }
        }
    }

    pub async fn probe_health(&self) {
        let healthy = match self.backend.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                false
            }
        };
        self.metrics.record_probe(ProbeKind::Health, healthy).await;
        let changed = self.state.send_if_modified(|s| {
            self.health_reported.store(true, Ordering::SeqCst);
            replace(&mut s.connected, healthy)
        });
        if changed {
            if healthy {
                tracing::info!("Backend reachable");
            } else {
                tracing::warn!("Backend unreachable");
            }
        }
    }

    /// Fetch the latest screenshot unless a live stream is active. The stream
    /// check is repeated when applying, so a response that was in flight when
    /// the stream appeared is dropped.
    pub async fn poll_screenshot(&self) {
        if self.state.borrow().stream_url.is_some() {
            return;
        }

        match self.backend.browser_state().await {
            Ok(snapshot) => {
                self.metrics.record_probe(ProbeKind::Screenshot, true).await;
                let Some(screenshot) = snapshot.screenshot.filter(|s| !s.is_empty()) else {
                    return;
                };
                let url = snapshot.url.filter(|u| !u.is_empty());
                self.state.send_if_modified(|s| {
                    if s.stream_url.is_some() {
                        return false;
                    }
                    let mut changed = false;
                    if s.screenshot.as_deref() != Some(screenshot.as_str()) {
                        s.screenshot = Some(screenshot);
                        changed = true;
                    }
                    if let Some(url) = url {
                        if s.url.as_deref() != Some(url.as_str()) {
                            s.url = Some(url);
                            changed = true;
                        }
                    }
                    changed
                });
            }
            Err(e) => {
                self.metrics.record_probe(ProbeKind::Screenshot, false).await;
                tracing::trace!(error = %e, "Screenshot poll failed");
            }
        }
    }

    /// Ask the backend to reset its browser, then clear the local view.
    /// `stream_url` and `connected` are left alone.
    pub async fn reset(&self) -> Result<(), BackendError> {
        self.backend.browser_command(BrowserCommand::Reset).await?;
        self.state.send_if_modified(|s| {
            let changed = s.url.is_some() || s.screenshot.is_some() || s.is_loading;
            s.url = None;
            s.screenshot = None;
            s.is_loading = false;
            changed
        });
        tracing::info!("Remote browser reset");
        Ok(())
    }

    /// Spawn the three polling loops. They run until the handle is stopped
    /// or dropped.
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        tracing::info!(
            health_ms = self.intervals.health.as_millis() as u64,
            stream_ms = self.intervals.stream_probe.as_millis() as u64,
            screenshot_ms = self.intervals.screenshot.as_millis() as u64,
            "Session monitor starting"
        );

        let now = Instant::now();
        let stream = {
            let monitor = Arc::clone(self);
            // stream availability is checked immediately on startup
            spawn_loop(now, self.intervals.stream_probe, move || {
                let monitor = Arc::clone(&monitor);
                async move { monitor.probe_stream().await }
            })
        };
        let health = {
            let monitor = Arc::clone(self);
            spawn_loop(now + self.intervals.health, self.intervals.health, move || {
                let monitor = Arc::clone(&monitor);
                async move { monitor.probe_health().await }
            })
        };
        let screenshot = {
            let monitor = Arc::clone(self);
            spawn_loop(
                now + self.intervals.screenshot,
                self.intervals.screenshot,
                move || {
                    let monitor = Arc::clone(&monitor);
                    async move { monitor.poll_screenshot().await }
                },
            )
        };

        MonitorHandle {
            tasks: vec![stream, health, screenshot],
        }
    }
}

fn spawn_loop<F, Fut>(start: Instant, period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tick().await;
        }
    })
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Owns the monitor's timer tasks; aborting them discards in-flight probes.
pub struct MonitorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn stop(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            tracing::debug!("Stopping session monitor");
        }
        self.abort_all();
    }
}
