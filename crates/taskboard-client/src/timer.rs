//! Persisted task timer
//!
//! One stopwatch for the whole app, stored as JSON under
//! `global-task-timer` so it survives restarts. Elapsed time is kept in
//! whole seconds; the running span is folded in on stop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taskboard_auth::{Clock, KeyValueStore, StorageError, TIMER_KEY};
use tracing::{debug, warn};

/// Timer snapshot as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub running: bool,
    pub task_id: Option<String>,
    /// Unix milliseconds when the current run started
    pub start_time: Option<u64>,
    /// Seconds accumulated by finished runs
    pub elapsed: u64,
}

pub struct TaskTimer {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TaskTimer {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Current state. An unreadable stored value reads as idle.
    pub fn state(&self) -> TimerState {
        let Some(raw) = self.storage.get(TIMER_KEY) else {
            return TimerState::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable timer state");
            TimerState::default()
        })
    }

    /// Start timing `task_id` from zero, discarding any previous run.
    pub fn start(&self, task_id: &str) -> Result<TimerState, StorageError> {
        let state = TimerState {
            running: true,
            task_id: Some(task_id.to_string()),
            start_time: Some(self.clock.now_millis()),
            elapsed: 0,
        };
        debug!(task_id, "timer started");
        self.save(state)
    }

    /// Stop and fold the running span into `elapsed`. No-op when stopped.
    pub fn stop(&self) -> Result<TimerState, StorageError> {
        let state = self.state();
        if !state.running {
            return Ok(state);
        }
        let elapsed = state.elapsed + self.running_secs(&state);
        debug!(elapsed, "timer stopped");
        self.save(TimerState {
            running: false,
            task_id: state.task_id,
            start_time: None,
            elapsed,
        })
    }

    /// Back to idle with no task.
    pub fn reset(&self) -> Result<TimerState, StorageError> {
        debug!("timer reset");
        self.save(TimerState::default())
    }

    /// Seconds timed for the current task, including the running span.
    pub fn elapsed_secs(&self) -> u64 {
        let state = self.state();
        if state.task_id.is_none() {
            return 0;
        }
        if state.running {
            state.elapsed + self.running_secs(&state)
        } else {
            state.elapsed
        }
    }

    fn running_secs(&self, state: &TimerState) -> u64 {
        state
            .start_time
            .map(|start| self.clock.now_millis().saturating_sub(start) / 1000)
            .unwrap_or(0)
    }

    fn save(&self, state: TimerState) -> Result<TimerState, StorageError> {
        let raw = serde_json::to_string(&state)
            .map_err(|e| StorageError(format!("serializing timer state: {e}")))?;
        self.storage.set(TIMER_KEY, raw)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use taskboard_auth::{ManualClock, MemoryStore};

    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn timer() -> (TaskTimer, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(T0));
        let storage = Arc::new(MemoryStore::new());
        (TaskTimer::new(storage.clone(), clock.clone()), clock, storage)
    }

    #[test]
    fn idle_timer_reports_zero() {
        let (timer, _, _) = timer();
        assert_eq!(timer.state(), TimerState::default());
        assert_eq!(timer.elapsed_secs(), 0);
    }

    #[test]
    fn running_time_counts_whole_seconds() {
        let (timer, clock, _) = timer();
        timer.start("42").unwrap();
        clock.advance(Duration::from_millis(2_999));
        assert_eq!(timer.elapsed_secs(), 2);
        assert!(timer.state().running);
    }

    #[test]
    fn stop_folds_span_and_is_idempotent() {
        let (timer, clock, _) = timer();
        timer.start("42").unwrap();
        clock.advance(Duration::from_secs(90));

        let stopped = timer.stop().unwrap();
        assert!(!stopped.running);
        assert_eq!(stopped.elapsed, 90);
        assert_eq!(stopped.task_id.as_deref(), Some("42"));
        assert!(stopped.start_time.is_none());

        clock.advance(Duration::from_secs(60));
        assert_eq!(timer.stop().unwrap().elapsed, 90);
        assert_eq!(timer.elapsed_secs(), 90);
    }

    #[test]
    fn start_resets_previous_run() {
        let (timer, clock, _) = timer();
        timer.start("1").unwrap();
        clock.advance(Duration::from_secs(30));
        timer.stop().unwrap();

        timer.start("2").unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(timer.elapsed_secs(), 5);
        assert_eq!(timer.state().task_id.as_deref(), Some("2"));
    }

    #[test]
    fn reset_returns_to_idle() {
        let (timer, clock, _) = timer();
        timer.start("1").unwrap();
        clock.advance(Duration::from_secs(30));
        timer.reset().unwrap();

        assert_eq!(timer.state(), TimerState::default());
        assert_eq!(timer.elapsed_secs(), 0);
    }

    #[test]
    fn state_survives_a_new_timer_instance() {
        let (timer, clock, storage) = timer();
        timer.start("7").unwrap();
        clock.advance(Duration::from_secs(12));

        let reopened = TaskTimer::new(storage, clock);
        assert_eq!(reopened.elapsed_secs(), 12);
    }

    #[test]
    fn persisted_shape_uses_camel_case() {
        let (timer, _, storage) = timer();
        timer.start("7").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&storage.get(TIMER_KEY).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "running": true,
                "taskId": "7",
                "startTime": T0,
                "elapsed": 0
            })
        );
    }

    #[test]
    fn unreadable_state_reads_as_idle() {
        let (timer, _, storage) = timer();
        storage.set(TIMER_KEY, "{broken".into()).unwrap();

        assert_eq!(timer.state(), TimerState::default());
        assert_eq!(timer.stop().unwrap(), TimerState::default());
    }

    #[test]
    fn clock_going_backwards_counts_as_zero() {
        let (timer, clock, _) = timer();
        timer.start("1").unwrap();
        clock.set(T0 - 10_000);
        assert_eq!(timer.elapsed_secs(), 0);
    }
}
