//! Backend token endpoints and storage keys
//!
//! Endpoint paths are relative to the configured API base URL, which already
//! carries the `/api` prefix (e.g. `https://board.example.com/api`).

use std::time::Duration;

/// Email/password login, answers with an access/refresh pair
pub const LOGIN_PATH: &str = "/token_obtain_pair/";

/// Refresh-token exchange, answers with a new access token
pub const REFRESH_PATH: &str = "/token/refresh/";

/// Storage key of the access token
pub const ACCESS_KEY: &str = "access";

/// Storage key of the refresh token
pub const REFRESH_KEY: &str = "refresh";

/// Storage key of the persisted task timer
pub const TIMER_KEY: &str = "global-task-timer";

/// Seconds before `exp` at which an access token is already treated as
/// expired, so a token never lapses between the check and the request.
pub const DEFAULT_EXPIRY_SKEW_SECS: u64 = 5;

/// Upper bound on a single login or refresh call.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);
