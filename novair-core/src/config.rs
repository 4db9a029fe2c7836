//! Engine configuration.

use crate::{ConfigError, NovairError, NovairResult};
use serde::{Deserialize, Serialize};

/// Runtime configuration for the decision engine.
///
/// A system's `tick` block, if present, overrides `tick_interval_ms`,
/// `action_threshold` and `continuous_mode` at engine construction time;
/// everything else here is purely a deployment knob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tick_interval_ms: u64,
    pub action_threshold: f64,
    pub continuous_mode: bool,
    /// Accepted but has no observable effect beyond 1; see the design notes
    /// on multi-action dispatch.
    pub max_actions_per_tick: u32,
    /// When true, selection still runs but handlers are never invoked.
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            action_threshold: 0.5,
            continuous_mode: true,
            max_actions_per_tick: 1,
            dry_run: false,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables, falling back to
    /// [`EngineConfig::default`] for anything unset or unparseable.
    ///
    /// Environment variables:
    /// - `NOVAIR_TICK_INTERVAL_MS`
    /// - `NOVAIR_ACTION_THRESHOLD`
    /// - `NOVAIR_CONTINUOUS_MODE`
    /// - `NOVAIR_MAX_ACTIONS_PER_TICK`
    /// - `NOVAIR_DRY_RUN`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            tick_interval_ms: std::env::var("NOVAIR_TICK_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.tick_interval_ms),
            action_threshold: std::env::var("NOVAIR_ACTION_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.action_threshold),
            continuous_mode: std::env::var("NOVAIR_CONTINUOUS_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.continuous_mode),
            max_actions_per_tick: std::env::var("NOVAIR_MAX_ACTIONS_PER_TICK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_actions_per_tick),
            dry_run: std::env::var("NOVAIR_DRY_RUN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.dry_run),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - `tick_interval_ms` > 0
    /// - `action_threshold` within `[-1000.0, 1000.0]` (scores are unbounded
    ///   reals, but a threshold far outside this band is almost certainly a
    ///   misconfiguration rather than an intentional always-on/always-off
    ///   setting)
    pub fn validate(&self) -> NovairResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(NovairError::Config(ConfigError::NonPositiveInterval {
                value: 0,
            }));
        }

        const THRESHOLD_MIN: f64 = -1000.0;
        const THRESHOLD_MAX: f64 = 1000.0;
        if !(THRESHOLD_MIN..=THRESHOLD_MAX).contains(&self.action_threshold) {
            return Err(NovairError::Config(ConfigError::ThresholdOutOfRange {
                value: self.action_threshold,
                min: THRESHOLD_MIN,
                max: THRESHOLD_MAX,
            }));
        }

        Ok(())
    }
}
