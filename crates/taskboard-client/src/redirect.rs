//! Login redirect hook
//!
//! Called when the pipeline ends a session it cannot recover, once per
//! login however many requests fail together. The front end decides what
//! "go to login" means (a prompt, a screen change).

use std::sync::{Mutex, PoisonError};

use tracing::debug;

pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, reason: &str);
}

/// Ignores redirects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRedirect;

impl LoginRedirect for NoopRedirect {
    fn redirect_to_login(&self, reason: &str) {
        debug!(reason, "login redirect ignored");
    }
}

/// Remembers every redirect reason.
#[derive(Debug, Default)]
pub struct RecordingRedirect {
    reasons: Mutex<Vec<String>>,
}

impl RecordingRedirect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.reasons().len()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.reasons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self, reason: &str) {
        self.reasons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reason.to_string());
    }
}
