//! Assistant module - Manual/auto arbitration around the PID engine

use crossbeam::channel::Sender;
use std::time::Instant;

use crate::config::AssistConfig;
use crate::gains::{GainSet, GainStore};
use crate::persist::{ParamStore, StoreError};
use crate::pid::PidEngine;

// ============================================================================
// ASSIST MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistMode {
    /// No recent hand movement; assist may correct.
    Auto,
    /// Rider is driving the throttle; assist stands down.
    Manual,
}

// ============================================================================
// SNAPSHOT - Read-only state for diagnostics and UI
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssistantSnapshot {
    pub enabled: bool,
    pub mode: AssistMode,
    pub previous_throttle: u8,
    pub integral: f32,
    pub output: f32,
    pub gains: GainSet,
    pub learned: bool,
    pub samples_collected: usize,
    pub oscillation_count: u32,
    pub avg_error: f32,
    pub error_variance: f32,
}

// ============================================================================
// LEVEL ASSISTANT - The per-tick entry point
// ============================================================================

pub struct LevelAssistant {
    cfg: AssistConfig,
    gains: GainStore,
    pid: PidEngine,
    enabled: bool,
    mode: AssistMode,
    previous_throttle: u8,
    last_manual: Option<Instant>,
}

impl LevelAssistant {
    pub fn new(cfg: AssistConfig) -> Self {
        let pid = PidEngine::new(&cfg);
        Self {
            previous_throttle: cfg.neutral_center,
            cfg,
            gains: GainStore::new(),
            pid,
            enabled: false,
            mode: AssistMode::Auto,
            last_manual: None,
        }
    }

    /// Pull previously learned gains out of storage. `Ok(false)` means none
    /// were found and the factory defaults stand.
    pub fn load_gains(&mut self, store: &dyn ParamStore) -> Result<bool, StoreError> {
        self.gains.load(store)
    }

    /// Route adapted gains to a deferred persistence worker.
    pub fn attach_persistence(&mut self, tx: Sender<GainSet>) {
        self.pid.attach_persistence(tx);
    }

    /// One control tick: raw throttle and motor speed in, corrected
    /// throttle out. Must stay cheap; runs at ~100 Hz.
    pub fn process(&mut self, throttle: u8, erpm: i32, enabled: bool, now: Instant) -> u8 {
        if !enabled {
            // Bypass entirely; no residual correction may leak into a
            // later re-enable
            self.enabled = false;
            self.mode = AssistMode::Auto;
            self.pid.zero();
            self.previous_throttle = throttle;
            return throttle;
        }
        self.enabled = true;

        let delta = (i16::from(throttle) - i16::from(self.previous_throttle)).unsigned_abs();
        if delta >= u16::from(self.cfg.manual_threshold) {
            self.mode = AssistMode::Manual;
            self.last_manual = Some(now);
            // Windup must not carry into a hand-driven throttle
            self.pid.zero();
        }

        if self.mode == AssistMode::Manual {
            let expired = self
                .last_manual
                .map(|t| now.saturating_duration_since(t) > self.cfg.manual_timeout())
                .unwrap_or(true);
            if expired {
                self.mode = AssistMode::Auto;
            }
        }

        let neutral = (i16::from(throttle) - i16::from(self.cfg.neutral_center)).unsigned_abs()
            <= u16::from(self.cfg.neutral_threshold);

        let mut corrected = throttle;
        if self.mode == AssistMode::Auto && neutral {
            let output = self.pid.compute(
                self.cfg.setpoint_erpm,
                erpm as f32,
                now,
                &mut self.gains,
            );
            if output.abs() > self.cfg.min_effect {
                if output > 0.0 {
                    let raised = f32::from(self.cfg.neutral_center) + output;
                    corrected = raised.min(f32::from(self.cfg.max_throttle)) as u8;
                } else {
                    // Board already moving the compensating way: hold
                    // neutral, never issue reverse throttle
                    corrected = self.cfg.neutral_center;
                }
            }
        } else {
            self.pid.decay();
        }

        self.previous_throttle = throttle;
        corrected
    }

    /// Operator-requested recalibration; not part of the ordinary cycle.
    pub fn reset(&mut self) {
        self.mode = AssistMode::Auto;
        self.previous_throttle = self.cfg.neutral_center;
        self.last_manual = None;
        self.pid.reset();
    }

    pub fn snapshot(&self) -> AssistantSnapshot {
        let window = self.pid.window();
        AssistantSnapshot {
            enabled: self.enabled,
            mode: self.mode,
            previous_throttle: self.previous_throttle,
            integral: self.pid.integral(),
            output: self.pid.output(),
            gains: self.gains.gains(),
            learned: self.gains.learned(),
            samples_collected: window.samples(),
            oscillation_count: window.oscillation_count(),
            avg_error: window.avg_error(),
            error_variance: window.error_variance(),
        }
    }

    // ------------------------------------------------------------------
    // Tuning surface: bounded setters; rejected values change nothing.
    // An accepted Kp/Ki change drops the integrator so the new gain does
    // not land on top of accumulated windup.
    // ------------------------------------------------------------------

    pub fn set_kp(&mut self, kp: f32) {
        if self.gains.set_kp(kp) {
            self.pid.zero_integral();
        }
    }

    pub fn set_ki(&mut self, ki: f32) {
        if self.gains.set_ki(ki) {
            self.pid.zero_integral();
        }
    }

    pub fn set_kd(&mut self, kd: f32) {
        self.gains.set_kd(kd);
    }

    pub fn set_output_max(&mut self, output_max: f32) {
        self.gains.set_output_max(output_max);
    }

    pub fn gains(&self) -> GainSet {
        self.gains.gains()
    }

    pub fn save_gains(&self, store: &dyn ParamStore) -> Result<(), StoreError> {
        self.gains.save(store)
    }

    /// Back to factory gains; also drops PID memory so the change takes
    /// effect cleanly.
    pub fn reset_gains_to_defaults(&mut self, store: &dyn ParamStore) -> Result<(), StoreError> {
        let result = self.gains.reset_to_defaults(store);
        self.pid.zero();
        result
    }
}
