//! Persisted session tracker for a single training.
//!
//! Wraps a [`TrainingSessionState`] together with the store it is persisted to
//! and the clock transitions are stamped with. Storage failures never escape:
//! they are logged, a failed load falls back to a fresh session and a failed
//! write keeps the previous in-memory state.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::progress::{ExerciseMark, ExerciseProgress};
use crate::session::{SessionStatus, TrainingSessionState};
use crate::storage::{completed_exercises_key, skipped_exercises_key, state_key, KeyValueStore};

/// Result of asking the tracker to change state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TransitionOutcome {
    /// State changed and was persisted
    Applied,
    /// Transition not valid from the current state; nothing changed
    Ignored,
    /// Store rejected the write; in-memory state is unchanged
    NotPersisted,
}

impl TransitionOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

#[derive(Debug)]
pub struct SessionTracker<S: KeyValueStore, C: Clock> {
    training_id: String,
    store: S,
    clock: C,
    state: TrainingSessionState,
    progress: ExerciseProgress,
}

impl<S: KeyValueStore, C: Clock> SessionTracker<S, C> {
    /// Create a tracker and restore whatever was persisted for `training_id`
    pub fn new(training_id: impl Into<String>, store: S, clock: C) -> Self {
        let training_id = training_id.into();
        let state = load_state(&store, &training_id);
        let progress = ExerciseProgress::load(&store, &training_id);
        debug!(training_id = %training_id, status = %state.status(), "session loaded");

        Self {
            training_id,
            store,
            clock,
            state,
            progress,
        }
    }

    pub fn training_id(&self) -> &str {
        &self.training_id
    }

    pub fn state(&self) -> &TrainingSessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub fn progress(&self) -> &ExerciseProgress {
        &self.progress
    }

    /// Re-read state and progress from the store
    pub fn reload(&mut self) {
        self.state = load_state(&self.store, &self.training_id);
        self.progress = ExerciseProgress::load(&self.store, &self.training_id);
    }

    pub fn start(&mut self) -> TransitionOutcome {
        self.apply("start", TrainingSessionState::start)
    }

    pub fn pause(&mut self) -> TransitionOutcome {
        self.apply("pause", TrainingSessionState::pause)
    }

    pub fn resume(&mut self) -> TransitionOutcome {
        self.apply("resume", TrainingSessionState::resume)
    }

    pub fn complete(&mut self) -> TransitionOutcome {
        self.apply("complete", TrainingSessionState::complete)
    }

    /// Pause a running session or resume a paused one
    pub fn toggle_pause(&mut self) -> TransitionOutcome {
        match self.state.status() {
            SessionStatus::InProgress => self.pause(),
            SessionStatus::Paused => self.resume(),
            SessionStatus::NotStarted | SessionStatus::Completed => TransitionOutcome::Ignored,
        }
    }

    /// Forget the session and its exercise progress.
    ///
    /// The in-memory state is always reset; `NotPersisted` reports that at
    /// least one stored key could not be removed.
    pub fn reset(&mut self) -> TransitionOutcome {
        let keys = [
            state_key(&self.training_id),
            completed_exercises_key(&self.training_id),
            skipped_exercises_key(&self.training_id),
        ];

        let mut failed = false;
        for key in &keys {
            if let Err(e) = self.store.remove(key) {
                error!(training_id = %self.training_id, key = %key, error = %e, "failed to clear session key");
                failed = true;
            }
        }

        self.state = TrainingSessionState::NotStarted;
        self.progress = ExerciseProgress::default();
        info!(training_id = %self.training_id, "session reset");

        if failed {
            TransitionOutcome::NotPersisted
        } else {
            TransitionOutcome::Applied
        }
    }

    /// Whole seconds of active training time as of now
    pub fn elapsed_seconds(&self) -> u64 {
        self.state.elapsed_seconds(self.clock.now())
    }

    pub fn exercise_mark(&self, index: usize) -> ExerciseMark {
        self.progress.mark(index)
    }

    pub fn mark_exercise_completed(&mut self, index: usize) -> TransitionOutcome {
        self.update_progress(index, ExerciseMark::Completed)
    }

    pub fn mark_exercise_skipped(&mut self, index: usize) -> TransitionOutcome {
        self.update_progress(index, ExerciseMark::Skipped)
    }

    pub fn clear_exercise_mark(&mut self, index: usize) -> TransitionOutcome {
        self.update_progress(index, ExerciseMark::Pending)
    }

    fn update_progress(&mut self, index: usize, mark: ExerciseMark) -> TransitionOutcome {
        if self.progress.mark(index) == mark {
            return TransitionOutcome::Ignored;
        }

        let mut next = self.progress.clone();
        match mark {
            ExerciseMark::Completed => next.mark_completed(index),
            ExerciseMark::Skipped => next.mark_skipped(index),
            ExerciseMark::Pending => next.clear_mark(index),
        }

        match next.save(&self.store, &self.training_id) {
            Ok(()) => {
                debug!(training_id = %self.training_id, index, ?mark, "exercise progress updated");
                self.progress = next;
                TransitionOutcome::Applied
            }
            Err(e) => {
                error!(training_id = %self.training_id, index, error = %e, "failed to persist exercise progress");
                TransitionOutcome::NotPersisted
            }
        }
    }

    fn apply<F>(&mut self, action: &'static str, transition: F) -> TransitionOutcome
    where
        F: FnOnce(TrainingSessionState, DateTime<Utc>) -> Option<TrainingSessionState>,
    {
        let now = self.clock.now();
        let Some(next) = transition(self.state, now) else {
            debug!(training_id = %self.training_id, action, status = %self.state.status(), "transition ignored");
            return TransitionOutcome::Ignored;
        };

        match self.store.set_json(&state_key(&self.training_id), &next) {
            Ok(()) => {
                info!(
                    training_id = %self.training_id,
                    action,
                    from = %self.state.status(),
                    to = %next.status(),
                    "session transition"
                );
                self.state = next;
                TransitionOutcome::Applied
            }
            Err(e) => {
                error!(training_id = %self.training_id, action, error = %e, "failed to persist session state");
                TransitionOutcome::NotPersisted
            }
        }
    }
}

fn load_state<S: KeyValueStore>(store: &S, training_id: &str) -> TrainingSessionState {
    match store.get_json::<TrainingSessionState>(&state_key(training_id)) {
        Ok(Some(state)) => state,
        Ok(None) => TrainingSessionState::NotStarted,
        Err(e) => {
            warn!(training_id, error = %e, "failed to load session state, starting fresh");
            TrainingSessionState::NotStarted
        }
    }
}
