//! Queue and scheduler configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable read by [`QueueConfig::from_env`].
pub const CONCURRENCY_ENV: &str = "TASK_QUEUE_CONCURRENCY";

fn default_concurrency() -> usize {
    num_cpus::get()
}

/// Configuration for a single scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once. Defaults to the CPU count.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Root configuration: named schedulers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of queue name to configuration.
    pub queues: HashMap<String, QueueConfig>,
}

impl QueueConfig {
    /// Configuration with the given concurrency.
    #[must_use]
    pub const fn with_concurrency(concurrency: usize) -> Self {
        Self { concurrency }
    }

    /// Validate queue configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message when `concurrency` is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".into());
        }
        Ok(())
    }

    /// Build configuration from the environment, loading `.env` if present.
    ///
    /// Reads [`CONCURRENCY_ENV`]; when unset the CPU count is used.
    ///
    /// # Errors
    ///
    /// Returns a message when the variable is not a number or fails validation.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine; the process environment still applies.
        let _ = dotenvy::dotenv();
        Self::from_env_value(std::env::var(CONCURRENCY_ENV).ok().as_deref())
    }

    /// Build configuration from an optional raw concurrency value.
    ///
    /// # Errors
    ///
    /// Returns a message when `raw` is not a number or fails validation.
    pub fn from_env_value(raw: Option<&str>) -> Result<Self, String> {
        let cfg = match raw {
            Some(raw) => Self {
                concurrency: raw
                    .trim()
                    .parse()
                    .map_err(|e| format!("{CONCURRENCY_ENV}={raw:?}: {e}"))?,
            },
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl SchedulerConfig {
    /// Validate all queues and ensure at least one queue exists.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid queue.
    pub fn validate(&self) -> Result<(), String> {
        if self.queues.is_empty() {
            return Err("at least one queue must be defined".into());
        }
        for (name, queue) in &self.queues {
            queue
                .validate()
                .map_err(|e| format!("queue `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
