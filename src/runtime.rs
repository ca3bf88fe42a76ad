//! Event plumbing for the session screen.
//!
//! The screen pulls one [`AppEvent`] at a time from a [`Runner`]. When no
//! input arrives within the tick interval the runner yields [`AppEvent::Tick`]
//! so a running clock gets redrawn; once the input side hangs up it yields
//! [`AppEvent::Closed`] and the screen stops.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Shortest tick the runner accepts
pub const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// Nothing happened within a tick interval
    Tick,
    /// Input source is gone; nothing more will arrive
    Closed,
}

/// Anything the runner can pull screen events from
pub trait EventSource {
    fn next_event(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Channels feed scripted events in tests and headless drivers
impl EventSource for Receiver<AppEvent> {
    fn next_event(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.recv_timeout(timeout)
    }
}

/// Keyboard and resize events read from the terminal on a background thread
pub struct TerminalEvents {
    rx: Receiver<AppEvent>,
}

impl TerminalEvents {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let event = match event::read() {
                // Windows reports releases too; only presses drive the screen
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl EventSource for TerminalEvents {
    fn next_event(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.next_event(timeout)
    }
}

/// Turns an event source into a stream of screen events, one per call
pub struct Runner<E: EventSource> {
    events: E,
    tick: Duration,
}

impl<E: EventSource> Runner<E> {
    /// `tick` is raised to [`MIN_TICK`] so the loop never spins
    pub fn new(events: E, tick: Duration) -> Self {
        Self {
            events,
            tick: tick.max(MIN_TICK),
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Waits at most one tick for the next event
    pub fn step(&self) -> AppEvent {
        match self.events.next_event(self.tick) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => AppEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("event source disconnected");
                AppEvent::Closed
            }
        }
    }
}
