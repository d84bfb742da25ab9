//! Process-wide session state shared by the gateway and the expiry monitor.
//!
//! Readers get a [`SessionSnapshot`] (or a `watch` receiver of them). Writes
//! happen only through the transitions below: establish, renew, set user,
//! terminate. The in-flight refresh handle lives here too, so every clone of
//! the context observes the same refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::error::RefreshFailure;
use crate::models::{TokenPair, User};

pub(crate) type RefreshOutcome = Result<(), RefreshFailure>;
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    SignedOut,
    /// The expiry deadline passed without an extension
    Expired,
    /// The refresh credential was rejected, timed out, or unreachable
    RefreshFailed,
    /// A request was still unauthorized after a successful refresh
    Rejected,
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoutReason::SignedOut => write!(f, "signed out"),
            LogoutReason::Expired => write!(f, "session expired"),
            LogoutReason::RefreshFailed => write!(f, "session could not be refreshed"),
            LogoutReason::Rejected => write!(f, "session was rejected by the server"),
        }
    }
}

/// Sends the user to the unauthenticated entry point.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, reason: LogoutReason);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub expires_at: Option<Instant>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Time left before `expires_at`, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

struct SessionInner {
    state: watch::Sender<SessionSnapshot>,
    tokens: Mutex<Option<TokenPair>>,
    refresh: Mutex<Option<SharedRefresh>>,
    navigator: Arc<dyn Navigator>,
    // Set once the current session has navigated away; cleared by `establish`.
    navigated: AtomicBool,
}

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionContext {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                state,
                tokens: Mutex::new(None),
                refresh: Mutex::new(None),
                navigator,
                navigated: AtomicBool::new(false),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.inner.state.borrow().expires_at
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        lock(&self.inner.tokens).clone()
    }

    /// Start a session after login, registration, or resuming stored credentials.
    pub fn establish(&self, user: User, expires_in: Option<Duration>, tokens: Option<TokenPair>) {
        if let Some(pair) = tokens {
            *lock(&self.inner.tokens) = Some(pair);
        }
        let expires_at = expires_in.map(|d| Instant::now() + d);
        info!(user_id = user.id, expires_in_secs = expires_in.map(|d| d.as_secs()), "Session established");
        self.inner.navigated.store(false, Ordering::SeqCst);
        self.inner.state.send_replace(SessionSnapshot {
            user: Some(user),
            expires_at,
        });
    }

    /// Record the identity confirmed by the server without touching the deadline.
    pub fn set_user(&self, user: Option<User>) {
        if user.is_some() {
            self.inner.navigated.store(false, Ordering::SeqCst);
        }
        self.inner.state.send_if_modified(|snapshot| {
            if snapshot.user == user {
                return false;
            }
            snapshot.user = user;
            true
        });
    }

    /// Push the deadline out to `now + valid_for`. The deadline never moves
    /// backwards; an earlier value is ignored. An ended session has no
    /// deadline to move: nothing changes and `None` is returned.
    pub fn renew(&self, valid_for: Duration) -> Option<Instant> {
        let candidate = Instant::now() + valid_for;
        let mut ended = false;
        let mut advanced = false;
        self.inner.state.send_if_modified(|snapshot| {
            if !snapshot.is_authenticated() {
                ended = true;
                return false;
            }
            match snapshot.expires_at {
                Some(current) if current >= candidate => false,
                _ => {
                    snapshot.expires_at = Some(candidate);
                    advanced = true;
                    true
                }
            }
        });
        if ended {
            debug!("No session to renew");
            return None;
        }
        if advanced {
            debug!(valid_for_secs = valid_for.as_secs(), "Session deadline advanced");
        } else {
            debug!("Session deadline already later, not moved");
        }
        self.expires_at()
    }

    pub(crate) fn store_tokens(&self, tokens: TokenPair) {
        *lock(&self.inner.tokens) = Some(tokens);
    }

    /// Replace the held credential pair after a refresh. Returns `false`, and
    /// stores nothing, when the pair was cleared in the meantime.
    pub(crate) fn rotate_tokens(&self, tokens: TokenPair) -> bool {
        let mut slot = lock(&self.inner.tokens);
        if slot.is_none() {
            return false;
        }
        *slot = Some(tokens);
        true
    }

    /// Clear local session state and notify observers, without navigating.
    pub fn clear(&self) {
        *lock(&self.inner.tokens) = None;
        self.inner.state.send_if_modified(|snapshot| {
            if *snapshot == SessionSnapshot::default() {
                return false;
            }
            *snapshot = SessionSnapshot::default();
            true
        });
    }

    /// End the session: clear state and send the user to login. Navigation
    /// happens at most once per session, however many callers terminate it.
    /// Returns whether this call performed the navigation.
    pub fn terminate(&self, reason: LogoutReason) -> bool {
        self.clear();
        if self.inner.navigated.swap(true, Ordering::SeqCst) {
            debug!(%reason, "Session already terminated");
            return false;
        }
        match reason {
            LogoutReason::SignedOut => info!(%reason, "Session ended"),
            _ => warn!(%reason, "Session terminated"),
        }
        self.inner.navigator.redirect_to_login(reason);
        true
    }

    /// Run the refresh produced by `start`, or join the one already in
    /// flight. Every concurrent caller awaits the same future and sees the
    /// same outcome; the slot is emptied once that future resolves.
    pub(crate) async fn run_refresh<F>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let handle = {
            let mut slot = lock(&self.inner.refresh);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("Joining in-flight refresh");
                    in_flight.clone()
                }
                None => {
                    debug!("Starting refresh");
                    let fresh = start().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let outcome = handle.clone().await;

        let mut slot = lock(&self.inner.refresh);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&handle)) {
            *slot = None;
        }
        outcome
    }

    pub fn refresh_in_flight(&self) -> bool {
        lock(&self.inner.refresh).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_user, RecordingNavigator};

    fn context() -> (SessionContext, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        (SessionContext::new(navigator.clone()), navigator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_and_clear() {
        let (session, _) = context();
        assert!(!session.is_authenticated());

        session.establish(test_user(), Some(Duration::from_secs(900)), None);
        assert!(session.is_authenticated());
        assert_eq!(session.snapshot().remaining(), Some(Duration::from_secs(900)));

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.expires_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_only_moves_forward() {
        let (session, _) = context();
        session.establish(test_user(), Some(Duration::from_secs(600)), None);
        let before = session.expires_at().unwrap();

        // Shorter window: ignored
        session.renew(Duration::from_secs(60));
        assert_eq!(session.expires_at(), Some(before));

        tokio::time::advance(Duration::from_secs(10)).await;
        let after = session.renew(Duration::from_secs(600)).unwrap();
        assert!(after > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_ignores_ended_session() {
        let (session, _) = context();
        assert_eq!(session.renew(Duration::from_secs(900)), None);
        assert!(session.expires_at().is_none());

        session.establish(test_user(), Some(Duration::from_secs(60)), None);
        session.terminate(LogoutReason::Expired);
        let rx = session.subscribe();

        assert_eq!(session.renew(Duration::from_secs(900)), None);
        assert!(session.expires_at().is_none());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_rotate_tokens_needs_held_pair() {
        let (session, _) = context();
        let pair = |refresh: &str| TokenPair {
            access_token: "a".to_string(),
            refresh_token: refresh.to_string(),
        };

        assert!(!session.rotate_tokens(pair("r1")));
        assert!(session.tokens().is_none());

        session.store_tokens(pair("r1"));
        assert!(session.rotate_tokens(pair("r2")));
        assert_eq!(session.tokens().unwrap().refresh_token, "r2");

        session.clear();
        assert!(!session.rotate_tokens(pair("r3")));
        assert!(session.tokens().is_none());
    }

    #[tokio::test]
    async fn test_terminate_navigates_once_per_session() {
        let (session, navigator) = context();
        session.establish(test_user(), None, None);

        assert!(session.terminate(LogoutReason::RefreshFailed));
        assert!(!session.terminate(LogoutReason::Rejected));
        assert_eq!(navigator.reasons(), vec![LogoutReason::RefreshFailed]);
        assert!(!session.is_authenticated());

        // A new session re-arms the latch
        session.establish(test_user(), None, None);
        assert!(session.terminate(LogoutReason::Expired));
        assert_eq!(navigator.count(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let (session, _) = context();
        let mut rx = session.subscribe();

        session.establish(test_user(), None, None);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated());

        session.terminate(LogoutReason::SignedOut);
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_shares_one_future() {
        use std::sync::atomic::AtomicUsize;

        let (session, _) = context();
        let started = Arc::new(AtomicUsize::new(0));

        let make = |started: Arc<AtomicUsize>| {
            move || {
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                }
                .boxed()
            }
        };

        let (a, b, c) = tokio::join!(
            session.run_refresh(make(started.clone())),
            session.run_refresh(make(started.clone())),
            session.run_refresh(make(started.clone())),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!session.refresh_in_flight());

        // A later refresh starts fresh work
        session.run_refresh(make(started.clone())).await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_slot() {
        let (session, _) = context();
        let fail = || {
            async { Err(RefreshFailure::Rejected(reqwest::StatusCode::UNAUTHORIZED)) }.boxed()
        };
        let (a, b) = tokio::join!(session.run_refresh(fail), session.run_refresh(fail));
        assert_eq!(a, b);
        assert!(a.is_err());
        assert!(!session.refresh_in_flight());
    }
}
