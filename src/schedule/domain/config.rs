//! Tunables for schedule propagation and causal chain reconstruction.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Schedule engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Gap, in hours, between a blocker's finish and the earliest start of
    /// its dependents.
    ///
    /// The default of 24 follows the inclusive calendar-day convention: a
    /// task ending on day 3 frees its dependents on day 4.
    pub finish_to_start_lag_hours: i64,
    /// Abort the whole propagation on malformed task data instead of skipping
    /// the affected subtree.
    pub abort_on_resolver_error: bool,
    /// Maximum depth followed while reconstructing a causal chain.
    pub max_chain_depth: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            finish_to_start_lag_hours: 24,
            abort_on_resolver_error: false,
            max_chain_depth: 64,
        }
    }
}

impl ScheduleConfig {
    /// Creates a configuration that fails the propagation on any malformed
    /// task.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            abort_on_resolver_error: true,
            ..Default::default()
        }
    }

    /// Creates a configuration where dependents may start at the instant
    /// their blockers finish.
    #[must_use]
    pub fn contiguous() -> Self {
        Self {
            finish_to_start_lag_hours: 0,
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] for malformed input.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The finish-to-start lag as a duration.
    #[must_use]
    pub fn finish_to_start_lag(&self) -> TimeDelta {
        TimeDelta::try_hours(self.finish_to_start_lag_hours).unwrap_or(TimeDelta::MAX)
    }
}
