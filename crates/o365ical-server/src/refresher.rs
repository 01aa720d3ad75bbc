//! Background refresher for the cached calendar horizon.
//!
//! Once per tick every active session is checked: when its horizon window is
//! missing or older than the TTL it is fetched again and saved. Failures are
//! per user; they are logged and never stop the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use o365ical_core::cache_window;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::registry::{SessionRegistry, UserHandle};
use crate::window_cache::WindowCache;

/// Refresher configuration.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Delay between two passes over the sessions.
    pub tick: Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

impl RefresherConfig {
    /// Creates a config with the given tick.
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

/// Commands that can be sent to the refresher.
#[derive(Debug, Clone)]
pub enum RefresherCommand {
    /// Run a pass immediately.
    RefreshNow,
    /// Stop the refresher.
    Stop,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Users whose window was fetched and saved.
    pub refreshed: usize,
    /// Users whose window was still fresh.
    pub fresh: usize,
    /// Users whose refresh failed.
    pub failed: usize,
}

/// Refresher state, as reported on `/health`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefresherState {
    /// Number of completed passes.
    pub passes: u64,
    /// When the last pass ran.
    pub last_pass: Option<DateTime<Utc>>,
    /// Report of the last pass.
    pub last_report: PassReport,
}

/// Shared refresher state.
pub type SharedRefresherState = Arc<RwLock<RefresherState>>;

/// The step of a user refresh that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Fetch,
    Save,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch_window",
            Self::Save => "save_window",
        }
    }
}

/// Keeps every active user's horizon window fresh.
pub struct Refresher {
    config: RefresherConfig,
    registry: Arc<SessionRegistry>,
    cache: WindowCache,
    state: SharedRefresherState,
    command_tx: mpsc::Sender<RefresherCommand>,
    command_rx: Option<mpsc::Receiver<RefresherCommand>>,
}

impl Refresher {
    /// Creates a new refresher.
    pub fn new(config: RefresherConfig, registry: Arc<SessionRegistry>, cache: WindowCache) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            registry,
            cache,
            state: Arc::new(RwLock::new(RefresherState::default())),
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Returns a handle for sending commands to the refresher.
    pub fn handle(&self) -> RefresherHandle {
        RefresherHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Runs the refresher loop until stopped.
    pub async fn run(mut self) {
        let Some(mut command_rx) = self.command_rx.take() else {
            error!("refresher already running");
            return;
        };

        info!(tick_ms = self.config.tick.as_millis() as u64, "Refresher started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.tick) => {
                    self.pass(Utc::now()).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(RefresherCommand::RefreshNow) => {
                            debug!("Received RefreshNow command");
                            self.pass(Utc::now()).await;
                        }
                        Some(RefresherCommand::Stop) | None => {
                            info!("Refresher stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Runs one pass over every active session as of `now`.
    pub async fn pass(&self, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::default();

        for user in self.registry.active_sessions().await {
            match self.refresh_user(&user, now).await {
                Ok(true) => report.refreshed += 1,
                Ok(false) => report.fresh += 1,
                Err((step, message)) => {
                    error!(
                        user = %user.username(),
                        step = step.as_str(),
                        error = %message,
                        "refresh failed"
                    );
                    report.failed += 1;
                }
            }
        }

        let mut state = self.state.write().await;
        state.passes += 1;
        state.last_pass = Some(now);
        state.last_report = report;
        report
    }

    /// Refreshes one user's window if needed. Returns whether it was fetched.
    async fn refresh_user(&self, user: &UserHandle, now: DateTime<Utc>) -> Result<bool, (Step, String)> {
        let username = user.username();
        let window = cache_window(now);

        match self.cache.is_fresh(username, &window, now) {
            Ok(true) => return Ok(false),
            Ok(false) => {}
            Err(e) => warn!(user = %username, error = %e, "cache lookup failed, refetching"),
        }

        let events = user
            .client
            .calendar_view(&window)
            .await
            .map_err(|e| (Step::Fetch, e.to_string()))?;

        self.cache
            .save(username, &window, &events)
            .map_err(|e| (Step::Save, e.to_string()))?;

        info!(user = %username, count = events.len(), "horizon window refreshed");
        Ok(true)
    }
}

/// Handle for sending commands to a running refresher.
#[derive(Clone, Debug)]
pub struct RefresherHandle {
    command_tx: mpsc::Sender<RefresherCommand>,
    state: SharedRefresherState,
}

impl RefresherHandle {
    /// Queues an immediate pass without waiting. Fails when the refresher
    /// is gone or its queue is full.
    pub fn refresh_now(&self) -> Result<(), mpsc::error::TrySendError<RefresherCommand>> {
        self.command_tx.try_send(RefresherCommand::RefreshNow)
    }

    /// Stops the refresher.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<RefresherCommand>> {
        self.command_tx.send(RefresherCommand::Stop).await
    }

    /// Returns the current refresher state.
    pub async fn state(&self) -> RefresherState {
        self.state.read().await.clone()
    }
}
