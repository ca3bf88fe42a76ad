//! Training session lifecycle.
//!
//! A session is a pure value: every transition takes the current state and
//! "now" and yields the next state, or `None` when the transition does not
//! apply. Elapsed time is derived from stored timestamps, so nothing needs to
//! tick while the app is backgrounded or closed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Status label of a session, without the timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

/// Persisted session state for one training.
///
/// Serialized as `{"status": "...", "startTime": ms, "pauseTime": ms,
/// "totalPausedTime": ms}` where each variant only writes the fields it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainingSessionState {
    #[default]
    NotStarted,
    #[serde(rename_all = "camelCase")]
    InProgress {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        start_time: DateTime<Utc>,
        #[serde(with = "millis", default = "Duration::zero")]
        total_paused_time: Duration,
    },
    #[serde(rename_all = "camelCase")]
    Paused {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        start_time: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        pause_time: DateTime<Utc>,
        #[serde(with = "millis", default = "Duration::zero")]
        total_paused_time: Duration,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        start_time: DateTime<Utc>,
        #[serde(with = "millis", default = "Duration::zero")]
        total_paused_time: Duration,
    },
}

impl TrainingSessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::NotStarted => SessionStatus::NotStarted,
            Self::InProgress { .. } => SessionStatus::InProgress,
            Self::Paused { .. } => SessionStatus::Paused,
            Self::Completed { .. } => SessionStatus::Completed,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::NotStarted => None,
            Self::InProgress { start_time, .. }
            | Self::Paused { start_time, .. }
            | Self::Completed { start_time, .. } => Some(start_time),
        }
    }

    pub fn pause_time(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Paused { pause_time, .. } => Some(pause_time),
            _ => None,
        }
    }

    pub fn total_paused_time(&self) -> Duration {
        match *self {
            Self::NotStarted => Duration::zero(),
            Self::InProgress {
                total_paused_time, ..
            }
            | Self::Paused {
                total_paused_time, ..
            }
            | Self::Completed {
                total_paused_time, ..
            } => total_paused_time,
        }
    }

    /// Begin (or restart) the session. Accepted from every state.
    pub fn start(self, now: DateTime<Utc>) -> Option<Self> {
        Some(Self::InProgress {
            start_time: now,
            total_paused_time: Duration::zero(),
        })
    }

    pub fn pause(self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::InProgress {
                start_time,
                total_paused_time,
            } => Some(Self::Paused {
                start_time,
                pause_time: now,
                total_paused_time,
            }),
            _ => None,
        }
    }

    pub fn resume(self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::Paused {
                start_time,
                pause_time,
                total_paused_time,
            } => Some(Self::InProgress {
                start_time,
                total_paused_time: total_paused_time
                    .checked_add(&non_negative(now - pause_time))
                    .unwrap_or(Duration::MAX),
            }),
            _ => None,
        }
    }

    /// Finish the session. An open pause is closed first so it never counts
    /// as training time.
    pub fn complete(self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::InProgress {
                start_time,
                total_paused_time,
            } => Some(Self::Completed {
                start_time,
                total_paused_time,
            }),
            paused @ Self::Paused { .. } => paused.resume(now)?.complete(now),
            Self::NotStarted | Self::Completed { .. } => None,
        }
    }

    /// Active training time as of `now`.
    ///
    /// A completed session keeps counting from its start; only a paused one
    /// is frozen at the moment it was paused.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let raw = match *self {
            Self::NotStarted => Some(Duration::zero()),
            Self::Paused {
                start_time,
                pause_time,
                total_paused_time,
            } => (pause_time - start_time).checked_sub(&total_paused_time),
            Self::InProgress {
                start_time,
                total_paused_time,
            }
            | Self::Completed {
                start_time,
                total_paused_time,
            } => (now - start_time).checked_sub(&total_paused_time),
        };
        // underflow means far more pause than run time
        raw.map_or(Duration::zero(), non_negative)
    }

    /// Elapsed time floored to whole seconds, never negative
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed(now).num_seconds().max(0) as u64
    }
}

fn non_negative(d: Duration) -> Duration {
    if d < Duration::zero() {
        Duration::zero()
    } else {
        d
    }
}

/// Render whole seconds as `HH:MM:SS`
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Serde adapter storing a `Duration` as integer milliseconds
mod millis {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        // Older records may carry fractional milliseconds
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms >= i64::MAX as f64 {
            return Err(D::Error::custom(format!("paused time out of range: {ms}")));
        }
        Duration::try_milliseconds(ms.max(0.0).floor() as i64)
            .ok_or_else(|| D::Error::custom(format!("paused time out of range: {ms}")))
    }
}
