//! Unverified bearer-token decoding for client-side expiry checks
//!
//! Signature verification belongs to the server that issued the token. The
//! client only reads the claims segment to decide whether a token is worth
//! sending. Decoding is total: every malformation yields `None`, and a token
//! that cannot be decoded counts as expired.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Source of "now" in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Claims carried in an access token payload.
///
/// Only `exp` is required. The backend also issues `user_id`, `token_type`,
/// `jti` and `iat`; other issuers may use `sub`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the unix epoch
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// `sub`, falling back to the backend's `user_id` claim.
    pub fn subject(&self) -> Option<String> {
        if let Some(sub) = &self.sub {
            return Some(sub.clone());
        }
        match self.user_id.as_ref()? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn expires_at_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }
}

/// Decode the claims of a three-segment token without verifying it.
pub fn decode(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry checks against an injected clock.
#[derive(Clone)]
pub struct TokenCodec {
    clock: Arc<dyn Clock>,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TokenCodec {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn decode(&self, token: &str) -> Option<Claims> {
        decode(token)
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// True if the token is undecodable or expires within `skew_secs`.
    pub fn is_expired(&self, token: &str, skew_secs: u64) -> bool {
        let Some(claims) = decode(token) else {
            return true;
        };
        let skew_millis = i64::try_from(skew_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let deadline = claims.expires_at_millis().saturating_sub(skew_millis);
        let now = i64::try_from(self.now_millis()).unwrap_or(i64::MAX);
        deadline <= now
    }

    /// Time left before the token expires; zero once expired, `None` if
    /// undecodable.
    pub fn expires_in(&self, token: &str) -> Option<Duration> {
        let claims = decode(token)?;
        let now = i64::try_from(self.now_millis()).unwrap_or(i64::MAX);
        let remaining = claims.expires_at_millis().saturating_sub(now).max(0);
        Some(Duration::from_millis(remaining as u64))
    }
}
