//! Configuration module - Runtime thresholds and intervals for the assist core

use log::warn;
use serde::Deserialize;
use std::time::Duration;

// ============================================================================
// ASSIST CONFIG - All tunable thresholds of the level-assist core
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Throttle value considered dead center (0-255 scale).
    pub neutral_center: u8,
    /// Half-width of the neutral band around the center.
    pub neutral_threshold: u8,
    /// Single-tick throttle delta that counts as manual input.
    pub manual_threshold: u8,
    /// Time without qualifying movement before manual mode expires.
    pub manual_timeout_ms: u64,
    /// Hard ceiling on any throttle the assist may command.
    pub max_throttle: u8,
    /// Corrections below this magnitude are not applied.
    pub min_effect: f32,
    /// Target motor speed while leveling (0 = hold still).
    pub setpoint_erpm: f32,
    /// Whether online gain adaptation runs at all.
    pub adaptive: bool,
    /// How often the gain adapter is allowed to make a decision.
    pub adapt_interval_ms: u64,
    /// Fractional step size for gain adaptation.
    pub learning_rate: f32,
    /// Mean absolute error above which the system is considered erroring.
    pub max_error_threshold: f32,
    /// Output sign flips per window that count as oscillation.
    pub oscillation_threshold: u32,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            neutral_center: 127,
            neutral_threshold: 5,
            manual_threshold: 3,
            manual_timeout_ms: 500,
            max_throttle: 200,
            min_effect: 1.0,
            setpoint_erpm: 0.0,
            adaptive: true,
            adapt_interval_ms: 200,
            learning_rate: 0.01,
            max_error_threshold: 10.0,
            oscillation_threshold: 3,
        }
    }
}

impl AssistConfig {
    pub fn manual_timeout(&self) -> Duration {
        Duration::from_millis(self.manual_timeout_ms)
    }

    pub fn adapt_interval(&self) -> Duration {
        Duration::from_millis(self.adapt_interval_ms)
    }
}

// ============================================================================
// CONFIG FILE LOADING
// ============================================================================

pub fn load_config(path: &str) -> AssistConfig {
    match std::fs::read_to_string(path) {
        Ok(s) => match toml::from_str::<AssistConfig>(&s) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("failed to parse {}: {} - using defaults", path, e);
                AssistConfig::default()
            }
        },
        Err(_) => AssistConfig::default(),
    }
}
