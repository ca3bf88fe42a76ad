use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::clock::Clock;
use crate::plan::Training;
use crate::runtime::AppEvent;
use crate::session::SessionStatus;
use crate::storage::KeyValueStore;
use crate::tracker::{SessionTracker, TransitionOutcome};

/// State of the session screen for one training
#[derive(Debug)]
pub struct App<S: KeyValueStore, C: Clock> {
    pub training: Training,
    pub tracker: SessionTracker<S, C>,
    /// Highlighted exercise in the plan list
    pub selected: usize,
    /// Feedback for the last key press, shown in the footer
    pub message: Option<String>,
    pub should_quit: bool,
}

impl<S: KeyValueStore, C: Clock> App<S, C> {
    pub fn new(training: Training, tracker: SessionTracker<S, C>) -> Self {
        let selected = tracker
            .progress()
            .next_pending(training.exercises.len())
            .unwrap_or(0);
        Self {
            training,
            tracker,
            selected,
            message: None,
            should_quit: false,
        }
    }

    pub fn exercise_count(&self) -> usize {
        self.training.exercises.len()
    }

    /// Returns true when the screen should be redrawn
    pub fn on_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Key(key) => {
                self.on_key(key);
                true
            }
            AppEvent::Resize => true,
            // only a running clock changes between ticks
            AppEvent::Tick => self.tracker.status() == SessionStatus::InProgress
                || self.tracker.status() == SessionStatus::Completed,
            AppEvent::Closed => {
                tracing::info!(training_id = %self.tracker.training_id(), "input closed, leaving screen");
                self.should_quit = true;
                false
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('s') => self.start(),
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                let outcome = self.tracker.toggle_pause();
                let verb = match self.tracker.status() {
                    SessionStatus::Paused => "paused",
                    _ => "resumed",
                };
                self.report(outcome, verb, "nothing to pause");
            }
            KeyCode::Char('c') => {
                let outcome = self.tracker.complete();
                self.report(outcome, "training completed", "session is not running");
            }
            KeyCode::Char('r') => {
                let outcome = self.tracker.reset();
                self.selected = 0;
                self.report(outcome, "session reset", "session reset");
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.exercise_count() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('d') => self.mark_selected(Mark::Done),
            KeyCode::Char('x') => self.mark_selected(Mark::Skip),
            KeyCode::Char('u') => self.mark_selected(Mark::Clear),
            _ => {}
        }
    }

    fn start(&mut self) {
        match self.tracker.status() {
            SessionStatus::NotStarted | SessionStatus::Completed => {
                let outcome = self.tracker.start();
                self.report(outcome, "training started", "");
            }
            SessionStatus::InProgress | SessionStatus::Paused => {
                self.message = Some("session already running, press r to reset".to_string());
            }
        }
    }

    fn mark_selected(&mut self, mark: Mark) {
        if self.selected >= self.exercise_count() {
            return;
        }
        let index = self.selected;
        let outcome = match mark {
            Mark::Done => self.tracker.mark_exercise_completed(index),
            Mark::Skip => self.tracker.mark_exercise_skipped(index),
            Mark::Clear => self.tracker.clear_exercise_mark(index),
        };

        let name = &self.training.exercises[index].name;
        let done_msg = match mark {
            Mark::Done => format!("{name} done"),
            Mark::Skip => format!("{name} skipped"),
            Mark::Clear => format!("{name} unmarked"),
        };
        self.report(outcome, &done_msg, "no change");

        if outcome.is_applied() && mark != Mark::Clear {
            if let Some(next) = self.tracker.progress().next_pending(self.exercise_count()) {
                self.selected = next;
            }
        }
    }

    fn report(&mut self, outcome: TransitionOutcome, applied: &str, ignored: &str) {
        self.message = match outcome {
            TransitionOutcome::Applied => Some(applied.to_string()),
            TransitionOutcome::Ignored if ignored.is_empty() => None,
            TransitionOutcome::Ignored => Some(ignored.to_string()),
            TransitionOutcome::NotPersisted => {
                Some("could not save session, see log".to_string())
            }
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Done,
    Skip,
    Clear,
}
