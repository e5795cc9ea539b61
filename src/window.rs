//! Performance window module - Rolling error/output history for adaptation

/// Number of samples evaluated per adaptation decision.
pub const PERFORMANCE_WINDOW: usize = 50;

/// Output magnitude below which sign flips are treated as noise.
const OSCILLATION_MIN_OUTPUT: f32 = 1.0;

// ============================================================================
// PERFORMANCE WINDOW - Circular buffers with mean/variance and flip count
// ============================================================================

#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    error_history: [f32; PERFORMANCE_WINDOW],
    output_history: [f32; PERFORMANCE_WINDOW],
    index: usize,
    samples: usize,
    avg_error: f32,
    error_variance: f32,
    oscillation_count: u32,
    last_output_sign: f32,
}

impl PerformanceWindow {
    pub fn new() -> Self {
        Self {
            error_history: [0.0; PERFORMANCE_WINDOW],
            output_history: [0.0; PERFORMANCE_WINDOW],
            index: 0,
            samples: 0,
            avg_error: 0.0,
            error_variance: 0.0,
            oscillation_count: 0,
            last_output_sign: 0.0,
        }
    }

    /// Push one cycle's absolute error and smoothed output.
    pub fn record(&mut self, error_abs: f32, output: f32) {
        self.error_history[self.index] = error_abs;
        self.output_history[self.index] = output;

        // A flip needs an established previous sign and a non-trivial output
        let sign = if output > 0.0 { 1.0 } else { -1.0 };
        if self.last_output_sign != 0.0
            && sign != self.last_output_sign
            && output.abs() > OSCILLATION_MIN_OUTPUT
        {
            self.oscillation_count += 1;
        }
        self.last_output_sign = sign;

        self.index = (self.index + 1) % PERFORMANCE_WINDOW;
        if self.samples < PERFORMANCE_WINDOW {
            self.samples += 1;
        }

        // Statistics are only meaningful over a full window
        if self.samples == PERFORMANCE_WINDOW {
            let mut sum = 0.0f32;
            let mut sum_squares = 0.0f32;
            for e in &self.error_history {
                sum += e;
                sum_squares += e * e;
            }
            self.avg_error = sum / PERFORMANCE_WINDOW as f32;
            self.error_variance =
                sum_squares / PERFORMANCE_WINDOW as f32 - self.avg_error * self.avg_error;
        }
    }

    pub fn is_full(&self) -> bool {
        self.samples == PERFORMANCE_WINDOW
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn avg_error(&self) -> f32 {
        self.avg_error
    }

    pub fn error_variance(&self) -> f32 {
        self.error_variance
    }

    pub fn oscillation_count(&self) -> u32 {
        self.oscillation_count
    }

    /// Output flips sign too often for a settling controller.
    pub fn is_oscillating(&self, threshold: u32) -> bool {
        self.oscillation_count > threshold
    }

    /// Error is small and does not scatter.
    pub fn is_stable(&self, max_error: f32, max_variance: f32) -> bool {
        self.avg_error < max_error && self.error_variance < max_variance
    }

    pub fn reset_oscillation(&mut self) {
        self.oscillation_count = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PerformanceWindow {
    fn default() -> Self {
        Self::new()
    }
}
