//! Taskboard session lifecycle
//!
//! The session manager is the only writer of the token store. It answers
//! "give me a token I can send" and makes sure that however many callers ask
//! while the access token is stale, exactly one refresh request goes out.

pub mod machine;
pub mod manager;

pub use machine::{SessionAction, SessionEvent, SessionState, handle_event};
pub use manager::SessionManager;
