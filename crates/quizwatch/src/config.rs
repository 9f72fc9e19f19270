//! Observer configuration
//!
//! Loaded from TOML; every key has a default so an empty file is valid.
//! The fairness floor and end-game relaxation are tuning parameters, not
//! hard invariants.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one observer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Scheduler and completion tick period
    pub tick_interval_ms: u64,
    /// Minimum eligible batches before anything is served (outside end-game)
    pub fairness_floor: usize,
    /// Once every in-scope component resolved, all pooled batches are eligible
    pub end_game_relaxation: bool,
    /// Consecutive empty-pool ticks required before declaring solved
    pub settle_ticks: u32,
    /// Answers per quiz item
    pub answer_count: usize,
    /// Reveal toggles after a wrong choice
    pub blink_count: u32,
    pub blink_interval_ms: u64,
    /// How long the correct acknowledgement is held
    pub correct_ack_ms: u64,
    /// Component kinds excluded from scope
    pub ignored_kinds: Vec<String>,
    /// Fixed RNG seed for reproducible selection
    pub seed: Option<u64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            fairness_floor: 3,
            end_game_relaxation: true,
            settle_ticks: 2,
            answer_count: 4,
            blink_count: 6,
            blink_interval_ms: 250,
            correct_ack_ms: 800,
            ignored_kinds: Vec::new(),
            seed: None,
        }
    }
}

impl ObserverConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded observer config");
        Ok(config)
    }

    /// Check value constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0".into()));
        }
        if self.fairness_floor == 0 {
            return Err(ConfigError::Invalid("fairness_floor must be >= 1".into()));
        }
        if self.settle_ticks == 0 {
            return Err(ConfigError::Invalid("settle_ticks must be >= 1".into()));
        }
        if self.answer_count < 2 {
            return Err(ConfigError::Invalid("answer_count must be >= 2".into()));
        }
        if self.blink_count == 0 {
            return Err(ConfigError::Invalid("blink_count must be >= 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_fairness_floor(mut self, floor: usize) -> Self {
        self.fairness_floor = floor;
        self
    }

    #[must_use]
    pub fn with_end_game_relaxation(mut self, enabled: bool) -> Self {
        self.end_game_relaxation = enabled;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_ignored_kind(mut self, kind: impl Into<String>) -> Self {
        self.ignored_kinds.push(kind.into());
        self
    }

    #[must_use]
    pub fn with_answer_count(mut self, count: usize) -> Self {
        self.answer_count = count;
        self
    }

    #[must_use]
    pub fn with_blinks(mut self, count: u32, interval: Duration) -> Self {
        self.blink_count = count;
        self.blink_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn correct_ack(&self) -> Duration {
        Duration::from_millis(self.correct_ack_ms)
    }

    /// Whether components of `kind` are monitored and counted
    #[must_use]
    pub fn is_in_scope(&self, kind: &str) -> bool {
        !self.ignored_kinds.iter().any(|k| k == kind)
    }
}
