//! Typed configuration from environment variables.

use std::time::Duration;

use crate::error::{Result, TetherError};

/// How long `await_completion` waits for the enqueue edge before rolling back.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);

/// Finished items kept in the queue history.
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TetherConfig {
    pub enqueue_timeout: Duration,
    pub max_history: usize,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl TetherConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults; set but malformed ones are errors.
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(ms) = parsed_var::<u64>("TETHER_ENQUEUE_TIMEOUT_MS")? {
            config.enqueue_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parsed_var::<usize>("TETHER_MAX_HISTORY")? {
            config.max_history = size;
        }
        Ok(config)
    }

    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }
}

/// Parse `name` from the environment. `None` when unset, `Config` error when malformed.
pub fn parsed_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| TetherError::Config(format!("{name} has an invalid value: {raw:?}")))
}
