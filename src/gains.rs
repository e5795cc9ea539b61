//! Gain store module - Tunable PID coefficients and their persisted form

use log::warn;

use crate::persist::{ParamStore, StoreError};

// Factory defaults, reduced from the first field revision for stability
pub const DEFAULT_KP: f32 = 0.3;
pub const DEFAULT_KI: f32 = 0.1;
pub const DEFAULT_KD: f32 = 0.02;
pub const DEFAULT_OUTPUT_MAX: f32 = 48.0;

pub const GAIN_NAMESPACE: &str = "level_pid";
const KEY_GAINS: &str = "gains";
const KEY_LEARNED: &str = "learned";
const RECORD_LEN: usize = 16;

// ============================================================================
// GAIN SET - The four live coefficients
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSet {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Saturation bound on the smoothed PID output, in throttle units.
    pub output_max: f32,
}

impl Default for GainSet {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
            output_max: DEFAULT_OUTPUT_MAX,
        }
    }
}

// ============================================================================
// GAIN STORE - Bounded setters, learned flag, persistence
// ============================================================================

pub struct GainStore {
    gains: GainSet,
    learned: bool,
}

impl GainStore {
    pub fn new() -> Self {
        Self {
            gains: GainSet::default(),
            learned: false,
        }
    }

    /// Wrap an already-adapted set, e.g. on the persistence worker side.
    pub fn with_learned_gains(gains: GainSet) -> Self {
        Self {
            gains,
            learned: true,
        }
    }

    pub fn gains(&self) -> GainSet {
        self.gains
    }

    pub fn kp(&self) -> f32 {
        self.gains.kp
    }

    pub fn ki(&self) -> f32 {
        self.gains.ki
    }

    pub fn kd(&self) -> f32 {
        self.gains.kd
    }

    pub fn output_max(&self) -> f32 {
        self.gains.output_max
    }

    /// Whether the current values came from adaptation rather than defaults.
    pub fn learned(&self) -> bool {
        self.learned
    }

    // Setters are fed from low-trust tuning channels: an out-of-range or
    // non-finite value is dropped and the prior value stands. The return
    // value tells the caller whether live PID memory needs a reset.
    pub fn set_kp(&mut self, kp: f32) -> bool {
        if (0.0..=10.0).contains(&kp) {
            self.gains.kp = kp;
            true
        } else {
            false
        }
    }

    pub fn set_ki(&mut self, ki: f32) -> bool {
        if (0.0..=2.0).contains(&ki) {
            self.gains.ki = ki;
            true
        } else {
            false
        }
    }

    pub fn set_kd(&mut self, kd: f32) -> bool {
        if (0.0..=1.0).contains(&kd) {
            self.gains.kd = kd;
            true
        } else {
            false
        }
    }

    pub fn set_output_max(&mut self, output_max: f32) -> bool {
        if (10.0..=100.0).contains(&output_max) {
            self.gains.output_max = output_max;
            true
        } else {
            false
        }
    }

    /// Direct access for the gain adapter, which applies its own clamps.
    pub(crate) fn gains_mut(&mut self) -> &mut GainSet {
        &mut self.gains
    }

    pub(crate) fn mark_learned(&mut self) {
        self.learned = true;
    }

    // ------------------------------------------------------------------
    // Persistence: 16-byte little-endian record plus a one-byte flag
    // ------------------------------------------------------------------

    fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..4].copy_from_slice(&self.gains.kp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.gains.ki.to_le_bytes());
        buf[8..12].copy_from_slice(&self.gains.kd.to_le_bytes());
        buf[12..16].copy_from_slice(&self.gains.output_max.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Option<GainSet> {
        if buf.len() != RECORD_LEN {
            return None;
        }
        let gains = GainSet {
            kp: f32::from_le_bytes(buf[0..4].try_into().ok()?),
            ki: f32::from_le_bytes(buf[4..8].try_into().ok()?),
            kd: f32::from_le_bytes(buf[8..12].try_into().ok()?),
            output_max: f32::from_le_bytes(buf[12..16].try_into().ok()?),
        };
        let all_finite = gains.kp.is_finite()
            && gains.ki.is_finite()
            && gains.kd.is_finite()
            && gains.output_max.is_finite();
        all_finite.then_some(gains)
    }

    /// Persist the current set as learned values.
    pub fn save(&self, store: &dyn ParamStore) -> Result<(), StoreError> {
        store.set(GAIN_NAMESPACE, KEY_GAINS, &self.encode())?;
        store.set(GAIN_NAMESPACE, KEY_LEARNED, &[1])?;
        Ok(())
    }

    /// Load a previously learned set. `Ok(false)` means no learned data
    /// (or an unreadable record) and the current values stand.
    pub fn load(&mut self, store: &dyn ParamStore) -> Result<bool, StoreError> {
        match store.get(GAIN_NAMESPACE, KEY_LEARNED)? {
            Some(flag) if flag.first() == Some(&1) => {}
            _ => return Ok(false),
        }
        match store.get(GAIN_NAMESPACE, KEY_GAINS)? {
            Some(buf) => match Self::decode(&buf) {
                Some(gains) => {
                    self.gains = gains;
                    self.learned = true;
                    Ok(true)
                }
                None => {
                    warn!("discarding corrupt gain record ({} bytes)", buf.len());
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    /// Restore factory defaults and erase any persisted learned set.
    pub fn reset_to_defaults(&mut self, store: &dyn ParamStore) -> Result<(), StoreError> {
        self.gains = GainSet::default();
        self.learned = false;
        store.erase(GAIN_NAMESPACE)
    }
}

impl Default for GainStore {
    fn default() -> Self {
        Self::new()
    }
}
