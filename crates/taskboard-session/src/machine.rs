//! Session state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! `SessionManager` executes the I/O implied by each action (store writes,
//! refresh calls) and never changes state any other way.

/// Session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable token pair
    Anonymous,
    /// Token pair stored, no refresh in flight
    Authenticated,
    /// One refresh in flight, identified by its generation
    Refreshing { generation: u64 },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing { .. } => "refreshing",
        }
    }
}

/// Events that drive state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoginSucceeded,
    LoginFailed,
    /// A caller needs a fresh access token. `generation` is the id a newly
    /// started refresh would get; ignored when one is already in flight.
    AccessExpired { generation: u64 },
    RefreshSucceeded { generation: u64 },
    RefreshFailed { generation: u64 },
    Logout,
}

/// Actions the caller should execute after a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Persist the freshly issued pair
    StorePair,
    /// Spawn the single-flight refresh with this generation
    StartRefresh { generation: u64 },
    /// Await the refresh already in flight
    JoinRefresh { generation: u64 },
    /// Persist the refreshed access token
    StoreAccess,
    /// Remove both tokens
    ClearTokens,
    /// No session to refresh
    Reject,
    /// Stale refresh result: apply nothing
    Discard,
    /// No-op
    None,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: SessionState, event: SessionEvent) -> (SessionState, SessionAction) {
    match (state, event) {
        // --- Login replaces whatever session existed ---
        (_, SessionEvent::LoginSucceeded) => (SessionState::Authenticated, SessionAction::StorePair),

        (state, SessionEvent::LoginFailed) => (state, SessionAction::None),

        // --- Refresh demand ---
        (SessionState::Authenticated, SessionEvent::AccessExpired { generation }) => (
            SessionState::Refreshing { generation },
            SessionAction::StartRefresh { generation },
        ),

        (SessionState::Refreshing { generation }, SessionEvent::AccessExpired { .. }) => (
            SessionState::Refreshing { generation },
            SessionAction::JoinRefresh { generation },
        ),

        (SessionState::Anonymous, SessionEvent::AccessExpired { .. }) => {
            (SessionState::Anonymous, SessionAction::Reject)
        }

        // --- Refresh settlement, current generation only ---
        (
            SessionState::Refreshing { generation: current },
            SessionEvent::RefreshSucceeded { generation },
        ) if current == generation => (SessionState::Authenticated, SessionAction::StoreAccess),

        (
            SessionState::Refreshing { generation: current },
            SessionEvent::RefreshFailed { generation },
        ) if current == generation => (SessionState::Anonymous, SessionAction::ClearTokens),

        (
            state,
            SessionEvent::RefreshSucceeded { .. } | SessionEvent::RefreshFailed { .. },
        ) => (state, SessionAction::Discard),

        // --- Logout always wins ---
        (_, SessionEvent::Logout) => (SessionState::Anonymous, SessionAction::ClearTokens),
    }
}
