//! Session manager and single-flight token refresh
//!
//! Owns the token store, the session state and the pending-refresh slot.
//! A refresh is a boxed future made `Shared` and parked in the slot: the
//! first caller that finds the access token stale creates it, everyone else
//! clones it, and all of them observe the same outcome. The future writes the
//! store and empties the slot itself when it settles, under the same lock
//! that logout takes, so a logout either happens before the settlement (and
//! the result is discarded) or after it (and clears what was written).
//!
//! The std Mutex is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use taskboard_auth::{
    AuthEndpoints, AuthError, Claims, Clock, DEFAULT_AUTH_TIMEOUT, DEFAULT_EXPIRY_SKEW_SECS,
    RefreshResponse, Result, TokenCodec, TokenPair, TokenStore, decode,
};
use tracing::{debug, info, instrument, warn};

use crate::machine::{SessionAction, SessionEvent, SessionState, handle_event};

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

struct InFlight {
    generation: u64,
    refresh: SharedRefresh,
}

struct Inner {
    state: SessionState,
    last_generation: u64,
    in_flight: Option<InFlight>,
    /// Bumped by every successful login
    epoch: u64,
    /// Last epoch ended through `end`
    ended: Option<u64>,
}

/// Authenticated session over a persisted token pair.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct SessionManager {
    store: TokenStore,
    endpoints: AuthEndpoints,
    codec: TokenCodec,
    expiry_skew_secs: u64,
    refresh_timeout: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl SessionManager {
    /// Create a manager over `store`.
    ///
    /// A pair already in the store (from a previous run) resumes as an
    /// authenticated session; whether it is still usable is decided lazily.
    pub fn new(store: TokenStore, endpoints: AuthEndpoints) -> Self {
        let state = if store.get().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        info!(state = state.label(), "session manager initialized");

        Self {
            store,
            endpoints,
            codec: TokenCodec::default(),
            expiry_skew_secs: DEFAULT_EXPIRY_SKEW_SECS,
            refresh_timeout: DEFAULT_AUTH_TIMEOUT,
            inner: Arc::new(Mutex::new(Inner {
                state,
                last_generation: 0,
                in_flight: None,
                epoch: 0,
                ended: None,
            })),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.codec = TokenCodec::new(clock);
        self
    }

    pub fn with_expiry_skew(mut self, secs: u64) -> Self {
        self.expiry_skew_secs = secs;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner).state
    }

    /// A pair is stored, its access token has not expired and the session
    /// has not ended. No network.
    ///
    /// A pair left behind by a failed clear does not count.
    pub fn is_authenticated(&self) -> bool {
        if lock(&self.inner).state == SessionState::Anonymous {
            return false;
        }
        self.store
            .get()
            .is_some_and(|pair| !self.codec.is_expired(&pair.access, 0))
    }

    /// Claims of the stored access token, if any decode.
    pub fn claims(&self) -> Option<Claims> {
        self.store.get().and_then(|pair| decode(&pair.access))
    }

    /// Read-only view of the stored pair.
    pub fn tokens(&self) -> Option<TokenPair> {
        self.store.get()
    }

    /// Time until the stored access token expires.
    pub fn access_expires_in(&self) -> Option<Duration> {
        self.store
            .get()
            .and_then(|pair| self.codec.expires_in(&pair.access))
    }

    /// One login attempt. On success the pair replaces any existing session
    /// and abandons an in-flight refresh.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let outcome = self.endpoints.login(email, password).await;

        let mut inner = lock(&self.inner);
        match outcome {
            Ok(pair) => {
                if apply(&mut inner, SessionEvent::LoginSucceeded) == SessionAction::StorePair {
                    inner.in_flight = None;
                    inner.epoch += 1;
                    if let Err(e) = self.store.set(&pair) {
                        warn!(error = %e, "failed to persist token pair, dropping session");
                        apply(&mut inner, SessionEvent::Logout);
                        clear_store(&self.store);
                        metrics::counter!("taskboard_session_login_total", "outcome" => "failure")
                            .increment(1);
                        return Err(e);
                    }
                }
                info!("login succeeded");
                metrics::counter!("taskboard_session_login_total", "outcome" => "success")
                    .increment(1);
                Ok(pair)
            }
            Err(e) => {
                apply(&mut inner, SessionEvent::LoginFailed);
                warn!(error = %e, "login failed");
                metrics::counter!("taskboard_session_login_total", "outcome" => "failure")
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Access token that is safe to send right now.
    ///
    /// Returns the stored token when it is unexpired (with skew) and no
    /// refresh is in flight; otherwise starts or joins the single refresh.
    pub async fn ensure_fresh_token(&self) -> Result<String> {
        self.fresh_token(None).await
    }

    /// Access token to retry with after the server rejected `rejected`.
    ///
    /// If a concurrent refresh already replaced the rejected token the stored
    /// one is returned without another refresh. Otherwise the token is
    /// refreshed even though it still looks valid locally.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        self.fresh_token(Some(rejected)).await
    }

    /// End the session: clear the store, abandon any in-flight refresh.
    /// Idempotent, never fails, no network call.
    pub fn logout(&self) {
        let mut inner = lock(&self.inner);
        inner.in_flight = None;
        if apply(&mut inner, SessionEvent::Logout) == SessionAction::ClearTokens {
            clear_store(&self.store);
        }
        info!("logged out");
    }

    /// Identifies the current login. Changes whenever a login succeeds.
    pub fn epoch(&self) -> u64 {
        lock(&self.inner).epoch
    }

    /// Log out the session that began at `epoch`, at most once.
    ///
    /// Returns false without touching anything if that session was already
    /// ended this way or a newer login has replaced it.
    pub fn end(&self, epoch: u64) -> bool {
        let mut inner = lock(&self.inner);
        if inner.epoch != epoch || inner.ended == Some(epoch) {
            return false;
        }
        inner.ended = Some(epoch);
        inner.in_flight = None;
        if apply(&mut inner, SessionEvent::Logout) == SessionAction::ClearTokens {
            clear_store(&self.store);
        }
        info!(epoch, "session ended");
        true
    }

    async fn fresh_token(&self, rejected: Option<&str>) -> Result<String> {
        let refresh = {
            let mut inner = lock(&self.inner);

            let Some(pair) = self.store.get() else {
                if inner.state != SessionState::Anonymous {
                    apply(&mut inner, SessionEvent::Logout);
                }
                return Err(AuthError::NotAuthenticated);
            };

            if inner.in_flight.is_none() && inner.state == SessionState::Authenticated {
                let replaced = rejected.is_none_or(|rejected| rejected != pair.access);
                if replaced && !self.codec.is_expired(&pair.access, self.expiry_skew_secs) {
                    return Ok(pair.access);
                }
            }

            let next = inner.last_generation + 1;
            match apply(&mut inner, SessionEvent::AccessExpired { generation: next }) {
                SessionAction::StartRefresh { generation } => {
                    inner.last_generation = generation;
                    let refresh = self.spawn_refresh(generation, pair.refresh).shared();
                    inner.in_flight = Some(InFlight {
                        generation,
                        refresh: refresh.clone(),
                    });
                    refresh
                }
                SessionAction::JoinRefresh { generation } => match &inner.in_flight {
                    Some(in_flight) if in_flight.generation == generation => {
                        debug!(generation, "joining in-flight token refresh");
                        in_flight.refresh.clone()
                    }
                    _ => {
                        return Err(AuthError::RefreshFailed(format!(
                            "refresh generation {generation} is no longer in flight"
                        )));
                    }
                },
                _ => return Err(AuthError::NotAuthenticated),
            }
        };

        refresh.await
    }

    /// The refresh itself. Runs once per generation no matter how many
    /// callers await it.
    fn spawn_refresh(
        &self,
        generation: u64,
        refresh_token: String,
    ) -> BoxFuture<'static, Result<String>> {
        let endpoints = self.endpoints.clone();
        let store = self.store.clone();
        let inner = Arc::clone(&self.inner);
        let timeout = self.refresh_timeout;

        async move {
            debug!(generation, "starting token refresh");
            let outcome = match tokio::time::timeout(timeout, endpoints.refresh(&refresh_token)).await
            {
                Ok(result) => result,
                Err(_) => Err(AuthError::NetworkFailure(format!(
                    "token refresh timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            settle(&inner, &store, generation, outcome)
        }
        .boxed()
    }
}

/// Apply a settled refresh to the session. Runs under the session lock.
fn settle(
    inner: &Mutex<Inner>,
    store: &TokenStore,
    generation: u64,
    outcome: Result<RefreshResponse>,
) -> Result<String> {
    let mut inner = lock(inner);
    if inner
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| in_flight.generation == generation)
    {
        inner.in_flight = None;
    }

    match outcome {
        Ok(response) => {
            match apply(&mut inner, SessionEvent::RefreshSucceeded { generation }) {
                SessionAction::StoreAccess => {
                    let written = match response.refresh {
                        Some(rotated) => store.set(&TokenPair {
                            access: response.access.clone(),
                            refresh: rotated,
                        }),
                        None => store.set_access(&response.access),
                    };
                    if let Err(e) = written {
                        warn!(generation, error = %e, "failed to persist refreshed token");
                        metrics::counter!("taskboard_session_refresh_total", "outcome" => "failure")
                            .increment(1);
                        return Err(e);
                    }
                    info!(generation, "token refresh succeeded");
                    metrics::counter!("taskboard_session_refresh_total", "outcome" => "success")
                        .increment(1);
                }
                _ => {
                    info!(generation, "token refresh settled after session ended, result discarded");
                    metrics::counter!("taskboard_session_refresh_total", "outcome" => "discarded")
                        .increment(1);
                }
            }
            Ok(response.access)
        }
        Err(e) => {
            match apply(&mut inner, SessionEvent::RefreshFailed { generation }) {
                SessionAction::ClearTokens => {
                    warn!(generation, error = %e, "token refresh failed, session ended");
                    clear_store(store);
                    metrics::counter!("taskboard_session_refresh_total", "outcome" => "failure")
                        .increment(1);
                }
                _ => {
                    debug!(generation, error = %e, "stale token refresh failed, ignored");
                    metrics::counter!("taskboard_session_refresh_total", "outcome" => "discarded")
                        .increment(1);
                }
            }
            Err(e)
        }
    }
}

fn apply(inner: &mut Inner, event: SessionEvent) -> SessionAction {
    let (state, action) = handle_event(inner.state, event);
    if state != inner.state {
        debug!(from = inner.state.label(), to = state.label(), ?event, "session transition");
    }
    inner.state = state;
    action
}

fn clear_store(store: &TokenStore) {
    if let Err(e) = store.clear() {
        warn!(error = %e, "failed to clear stored tokens");
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
