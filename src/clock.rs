use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;

/// Source of "now" for anything that timestamps session transitions
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic tests and replays
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Clock pinned at the Unix epoch, handy for "t=0" scenarios
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
