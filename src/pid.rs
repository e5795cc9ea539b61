//! PID engine module - Discrete PID with asymmetric output smoothing

use crossbeam::channel::Sender;
use std::time::{Duration, Instant};

use crate::adaptive::GainAdapter;
use crate::config::AssistConfig;
use crate::gains::{GainSet, GainStore};
use crate::window::PerformanceWindow;

/// Floor for elapsed time between ticks; duplicate or out-of-order
/// timestamps must not blow up the derivative term.
const MIN_DT: Duration = Duration::from_millis(1);

/// Blend factors for the asymmetric smoother: correction releases fast
/// (70% new when falling) and builds slowly (30% new when rising).
const FALL_NEW_WEIGHT: f32 = 0.7;
const RISE_NEW_WEIGHT: f32 = 0.3;

/// Per-cycle decay applied to PID memory outside the assist band.
const IDLE_DECAY: f32 = 0.95;

// ============================================================================
// PID ENGINE - Stateful computation fed by live gains
// ============================================================================

pub struct PidEngine {
    integral: f32,
    previous_error: f32,
    output: f32,
    last_time: Option<Instant>,
    adaptive: bool,
    adapt_interval: Duration,
    last_adapt: Option<Instant>,
    window: PerformanceWindow,
    adapter: GainAdapter,
}

impl PidEngine {
    pub fn new(cfg: &AssistConfig) -> Self {
        Self {
            integral: 0.0,
            previous_error: 0.0,
            output: 0.0,
            last_time: None,
            adaptive: cfg.adaptive,
            adapt_interval: cfg.adapt_interval(),
            last_adapt: None,
            window: PerformanceWindow::new(),
            adapter: GainAdapter::new(cfg),
        }
    }

    pub fn attach_persistence(&mut self, tx: Sender<GainSet>) {
        self.adapter.attach_persistence(tx);
    }

    /// One control cycle. Reads the live gains from the store, feeds the
    /// performance window, and runs the adapter on its coarser cadence.
    pub fn compute(
        &mut self,
        setpoint: f32,
        measured: f32,
        now: Instant,
        store: &mut GainStore,
    ) -> f32 {
        let dt = match self.last_time {
            Some(prev) => now.saturating_duration_since(prev).max(MIN_DT),
            None => MIN_DT,
        }
        .as_secs_f32();

        let error = setpoint - measured;
        self.integral += error * dt;
        let derivative = (error - self.previous_error) / dt;

        let gains = store.gains();
        let raw = gains.kp * error + gains.ki * self.integral + gains.kd * derivative;

        self.output = if raw < self.output {
            (1.0 - FALL_NEW_WEIGHT) * self.output + FALL_NEW_WEIGHT * raw
        } else {
            (1.0 - RISE_NEW_WEIGHT) * self.output + RISE_NEW_WEIGHT * raw
        };
        self.output = self.output.clamp(-gains.output_max, gains.output_max);

        if self.adaptive {
            // Window gets every sample; gain decisions happen on a timer
            self.window.record(error.abs(), self.output);
            let adapt_due = match self.last_adapt {
                Some(prev) => now.saturating_duration_since(prev) >= self.adapt_interval,
                None => true,
            };
            if adapt_due {
                self.adapter.adapt(&mut self.window, store);
                self.last_adapt = Some(now);
            }
        }

        self.previous_error = error;
        self.last_time = Some(now);
        self.output
    }

    /// Drain PID memory gradually while assist is not acting, so that
    /// re-entering the band resumes smoothly instead of from zero.
    pub fn decay(&mut self) {
        self.integral *= IDLE_DECAY;
        self.output *= IDLE_DECAY;
    }

    /// Hard-drop the integrator and output (manual takeover, disable).
    pub fn zero(&mut self) {
        self.integral = 0.0;
        self.output = 0.0;
    }

    pub fn zero_integral(&mut self) {
        self.integral = 0.0;
    }

    /// Full reset including timers and the performance window.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.output = 0.0;
        self.last_time = None;
        self.last_adapt = None;
        self.window.reset();
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn window(&self) -> &PerformanceWindow {
        &self.window
    }
}
