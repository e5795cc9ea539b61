//! Adaptive module - Classifies recent controller behavior and nudges gains

use crossbeam::channel::Sender;
use log::{debug, info, warn};

use crate::config::AssistConfig;
use crate::gains::{GainSet, GainStore};
use crate::window::PerformanceWindow;

// Absolute bounds the adapter may never leave
const KP_MIN: f32 = 0.05;
const KP_MAX: f32 = 2.0;
const KI_MIN: f32 = 0.01;
const KI_MAX: f32 = 1.0;
const KD_MIN: f32 = 0.001;
const KD_MAX: f32 = 0.2;

/// Error variance above this disqualifies the system as stable.
const STABLE_VARIANCE_MAX: f32 = 5.0;
/// Mean error below which fine-tuning of damping is considered.
const FINE_TUNE_ERROR: f32 = 2.0;
/// Variance above which extra damping is added during fine-tuning.
const FINE_TUNE_VARIANCE: f32 = 1.0;
/// Relative gain movement that warrants persisting the set.
const SIGNIFICANT_CHANGE: f32 = 0.05;

// ============================================================================
// GAIN ADAPTER - Oscillating / erroring / stable rules
// ============================================================================

pub struct GainAdapter {
    learning_rate: f32,
    max_error_threshold: f32,
    oscillation_threshold: u32,
    persist_tx: Option<Sender<GainSet>>,
}

impl GainAdapter {
    pub fn new(cfg: &AssistConfig) -> Self {
        Self {
            learning_rate: cfg.learning_rate,
            max_error_threshold: cfg.max_error_threshold,
            oscillation_threshold: cfg.oscillation_threshold,
            persist_tx: None,
        }
    }

    /// Route significant gain changes to a deferred persistence worker.
    pub fn attach_persistence(&mut self, tx: Sender<GainSet>) {
        self.persist_tx = Some(tx);
    }

    /// One adaptation decision. No-op until the window holds a full set of
    /// samples; gains only ever move within their absolute bounds.
    pub fn adapt(&mut self, window: &mut PerformanceWindow, store: &mut GainStore) {
        if !window.is_full() {
            return;
        }

        let before = store.gains();
        let oscillating = window.is_oscillating(self.oscillation_threshold);
        let stable = window.is_stable(self.max_error_threshold, STABLE_VARIANCE_MAX);
        let avg_error = window.avg_error();

        let gains = store.gains_mut();
        if oscillating {
            // Too much sign flipping: slow the reaction down
            gains.kp *= 1.0 - self.learning_rate;
            gains.kd *= 1.0 - self.learning_rate * 0.5;
            gains.kp = gains.kp.max(KP_MIN);
            gains.kd = gains.kd.max(KD_MIN);
            window.reset_oscillation();
            info!("oscillation detected, gains relaxed to kp={:.4} kd={:.4}", gains.kp, gains.kd);
        } else if !stable && avg_error > self.max_error_threshold {
            // Persistent steady-state error: push harder on the integral
            gains.ki *= 1.0 + self.learning_rate;
            if avg_error > self.max_error_threshold * 2.0 {
                gains.kp *= 1.0 + self.learning_rate * 0.5;
            }
            gains.ki = gains.ki.min(KI_MAX);
            gains.kp = gains.kp.min(KP_MAX);
        } else if stable && avg_error < FINE_TUNE_ERROR && window.error_variance() > FINE_TUNE_VARIANCE {
            // Settled but jittery: add a little damping
            gains.kd *= 1.0 + self.learning_rate * 0.5;
            gains.kd = gains.kd.min(KD_MAX);
        }

        gains.kp = gains.kp.clamp(KP_MIN, KP_MAX);
        gains.ki = gains.ki.clamp(KI_MIN, KI_MAX);
        gains.kd = gains.kd.clamp(KD_MIN, KD_MAX);

        let after = store.gains();
        if significant_change(before, after) {
            store.mark_learned();
            self.request_save(after);
        }
    }

    fn request_save(&self, gains: GainSet) {
        match &self.persist_tx {
            Some(tx) => {
                if let Err(e) = tx.try_send(gains) {
                    // Control keeps running; the next significant change retries
                    warn!("gain save request dropped: {}", e);
                }
            }
            None => debug!("adapted gains not persisted (no store attached)"),
        }
    }
}

fn relative_change(before: f32, after: f32) -> f32 {
    if before == 0.0 {
        return if after == 0.0 { 0.0 } else { f32::INFINITY };
    }
    (after - before).abs() / before.abs()
}

fn significant_change(before: GainSet, after: GainSet) -> bool {
    relative_change(before.kp, after.kp) > SIGNIFICANT_CHANGE
        || relative_change(before.ki, after.ki) > SIGNIFICANT_CHANGE
        || relative_change(before.kd, after.kd) > SIGNIFICANT_CHANGE
        || relative_change(before.output_max, after.output_max) > SIGNIFICANT_CHANGE
}
