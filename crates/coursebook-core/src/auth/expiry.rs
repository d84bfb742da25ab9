//! Session expiry monitor.
//!
//! Polls the session deadline on a fixed interval, raises a warning shortly
//! before expiry, lets the user extend (through the gateway's shared refresh),
//! and forces logout when the deadline passes.
//!
//! ```text
//! Idle --start--> Active --remaining <= threshold--> Warning
//!                   ^                                   |
//!                   +------------ extend ok ------------+
//! Active/Warning --deadline reached / extend failed--> Terminated
//! Active/Warning --logout / session ended elsewhere--> Idle
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::session::LogoutReason;
use crate::api::{ApiClient, ApiError};
use crate::config::SessionSettings;
use crate::utils::format_countdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not authenticated, no timer
    Idle,
    /// Timer running, no warning shown
    Active,
    /// Deadline within the warning threshold; the expiry prompt is visible
    Warning,
    /// Deadline reached or extension failed; the session has been ended
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    pub state: MonitorState,
    /// An extension is in flight
    pub extending: bool,
}

impl MonitorStatus {
    pub fn warning_visible(&self) -> bool {
        self.state == MonitorState::Warning
    }
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Idle,
            extending: false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MonitorInner {
    client: ApiClient,
    settings: SessionSettings,
    status: watch::Sender<MonitorStatus>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        for slot in [&self.ticker, &self.watcher] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}

/// Resets the `extending` flag however `extend` exits.
struct ExtendGuard<'a>(&'a watch::Sender<MonitorStatus>);

impl Drop for ExtendGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|status| std::mem::replace(&mut status.extending, false));
    }
}

impl MonitorInner {
    fn state(&self) -> MonitorState {
        self.status.borrow().state
    }

    fn set_state(&self, state: MonitorState) {
        self.status.send_if_modified(|status| {
            if status.state == state {
                return false;
            }
            debug!(from = ?status.state, to = ?state, "Monitor transition");
            status.state = state;
            true
        });
    }

    fn ticker_running(&self) -> bool {
        lock(&self.ticker).as_ref().is_some_and(|h| !h.is_finished())
    }

    fn start(self: &Arc<Self>) -> bool {
        if !self.client.session().is_authenticated() {
            debug!("Not authenticated, monitor stays idle");
            return false;
        }

        let mut ticker = lock(&self.ticker);
        if ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        self.set_state(MonitorState::Active);
        let period = self.settings.check_interval();
        let weak: Weak<MonitorInner> = Arc::downgrade(self);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if matches!(inner.check(), MonitorState::Idle | MonitorState::Terminated) {
                    break;
                }
            }
        }));
        info!(interval_secs = period.as_secs(), "Session expiry monitor started");
        true
    }

    fn halt_ticker(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
            debug!("Expiry check cancelled");
        }
    }

    fn stop(&self) {
        self.halt_ticker();
        if self.state() != MonitorState::Terminated {
            self.set_state(MonitorState::Idle);
        }
    }

    /// One expiry check. Idempotent: repeating it with unchanged state changes nothing.
    fn check(&self) -> MonitorState {
        let state = self.state();
        if matches!(state, MonitorState::Idle | MonitorState::Terminated) {
            return state;
        }

        let snapshot = self.client.session().snapshot();
        if !snapshot.is_authenticated() {
            // Ended elsewhere, e.g. a failed gateway refresh
            debug!("Session gone, expiry monitor going idle");
            self.halt_ticker();
            self.set_state(MonitorState::Idle);
            return MonitorState::Idle;
        }
        let Some(remaining) = snapshot.remaining() else {
            return state;
        };

        if remaining.is_zero() {
            self.expire();
            return MonitorState::Terminated;
        }

        if remaining <= self.settings.warning_threshold() && state != MonitorState::Warning {
            info!(remaining = %format_countdown(remaining), "Session expiring soon");
            self.set_state(MonitorState::Warning);
            return MonitorState::Warning;
        }
        state
    }

    fn expire(&self) {
        warn!("Session deadline reached");
        self.set_state(MonitorState::Terminated);
        self.halt_ticker();
        self.client.session().terminate(LogoutReason::Expired);
    }

    /// Follow the session's authentication flag.
    fn sync(self: &Arc<Self>, authenticated: bool) {
        if authenticated {
            self.start();
        } else if self.ticker_running() || self.state() != MonitorState::Idle {
            self.stop();
        }
    }
}

/// Cheap to clone; clones drive the same monitor. Dropping the last clone
/// cancels its timer and session watcher.
#[derive(Clone)]
pub struct ExpiryMonitor {
    inner: Arc<MonitorInner>,
}

impl ExpiryMonitor {
    pub fn new(client: ApiClient, settings: SessionSettings) -> Self {
        let (status, _) = watch::channel(MonitorStatus::default());
        Self {
            inner: Arc::new(MonitorInner {
                client,
                settings,
                status,
                ticker: Mutex::new(None),
                watcher: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        *self.inner.status.borrow()
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.inner.status.subscribe()
    }

    /// Whether the periodic check is scheduled
    pub fn is_running(&self) -> bool {
        self.inner.ticker_running()
    }

    /// Idle → Active. Checks immediately, then every `check_interval`.
    /// Returns `false` when already running or not authenticated.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// Cancel the periodic check. Active/Warning → Idle; Terminated stays.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Run one check now.
    pub fn check(&self) -> MonitorState {
        self.inner.check()
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.client.session().snapshot().remaining()
    }

    /// Countdown for the warning prompt, e.g. `1:45`
    pub fn remaining_display(&self) -> String {
        self.remaining().map(format_countdown).unwrap_or_default()
    }

    /// Extend the session through the shared refresh. On success the
    /// deadline moves to `now + renewal_window` and a visible warning is
    /// dismissed; on failure the session is over. If the session ends while
    /// the refresh is in flight, it stays ended and the call fails. A second
    /// call while one is in flight returns immediately.
    pub async fn extend(&self) -> Result<(), ApiError> {
        let claimed = self.inner.status.send_if_modified(|status| {
            if status.extending {
                return false;
            }
            status.extending = true;
            true
        });
        if !claimed {
            debug!("Extension already in progress");
            return Ok(());
        }
        let _guard = ExtendGuard(&self.inner.status);

        match self.inner.client.refresh_session().await {
            Ok(()) => {
                let session = self.inner.client.session();
                if self.inner.state() == MonitorState::Terminated || !session.is_authenticated() {
                    warn!("Session ended while the extension was in flight");
                    return Err(ApiError::Unauthorized);
                }
                session.renew(self.inner.settings.renewal_window());
                if self.inner.state() == MonitorState::Warning {
                    self.inner.set_state(MonitorState::Active);
                }
                info!(remaining = %self.remaining_display(), "Session extended");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session extension failed");
                self.inner.set_state(MonitorState::Terminated);
                self.inner.halt_ticker();
                self.inner.client.session().terminate(LogoutReason::RefreshFailed);
                Err(e)
            }
        }
    }

    /// Explicit logout: stop checking, then end the session with the server.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.inner.stop();
        self.inner.client.logout().await
    }

    /// Start on authentication, stop when it ends, for as long as this
    /// monitor lives. Calling it again replaces the previous watcher.
    pub fn watch_session(&self) {
        let mut rx = self.inner.client.session().subscribe();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let authenticated = rx.borrow_and_update().is_authenticated();
                match weak.upgrade() {
                    Some(inner) => inner.sync(authenticated),
                    None => break,
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = lock(&self.inner.watcher).replace(handle) {
            previous.abort();
        }
    }

    /// Component teardown: cancel the timer and the session watcher.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.inner.watcher).take() {
            handle.abort();
        }
        self.inner.stop();
    }
}
