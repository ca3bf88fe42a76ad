//! Structured logging setup.
//!
//! The session screen owns the terminal, so interactive runs log to a file in
//! the state directory; headless actions log to stderr.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable consulted when no filter is passed explicitly
pub const LOG_ENV_VAR: &str = "GYMTRACK_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Pick the filter directive: explicit flag, then `GYMTRACK_LOG`, then config
pub fn resolve_filter(explicit: Option<&str>, configured: &str) -> String {
    if let Some(filter) = explicit {
        return filter.to_string();
    }
    match std::env::var(LOG_ENV_VAR) {
        Ok(from_env) if !from_env.trim().is_empty() => from_env,
        _ => configured.to_string(),
    }
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Calling it twice is an error, not a panic.
pub fn init(directive: &str, target: LogTarget) -> io::Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(directive));

    let installed = match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
    };
    installed.map_err(io::Error::other)
}
