//! Taskboard API client
//!
//! Every request goes through `RequestPipeline`, which attaches the session's
//! bearer token, refreshes and retries once on a 401, and ends the session
//! (logout + login redirect) when authorization cannot be recovered.
//! `TaskboardApi` layers the typed backend resources on top, and `TaskTimer`
//! is the persisted stopwatch used for time tracking.

pub mod api;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod redirect;
pub mod request;
pub mod timer;

pub use api::TaskboardApi;
pub use error::{RequestError, Result};
pub use pipeline::RequestPipeline;
pub use redirect::{LoginRedirect, NoopRedirect, RecordingRedirect};
pub use request::{ApiRequest, ApiResponse};
pub use timer::{TaskTimer, TimerState};
