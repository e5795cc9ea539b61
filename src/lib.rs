//! Level-assist throttle control core for a motorized board remote.
//!
//! Converts a raw hand-throttle sample and a telemetry-supplied motor speed
//! into a corrected throttle command: while the rider's hand is neutral, a
//! PID loop damps unwanted rolling; the instant the hand moves, assistance
//! stands down. Gains adapt online from a rolling performance window and are
//! persisted off the control path.

pub mod adaptive;
pub mod assistant;
pub mod config;
pub mod gains;
pub mod persist;
pub mod pid;
pub mod window;

pub use adaptive::GainAdapter;
pub use assistant::{AssistMode, AssistantSnapshot, LevelAssistant};
pub use config::{load_config, AssistConfig};
pub use gains::{GainSet, GainStore};
pub use persist::{
    save_channel, spawn_persistence_worker, MemoryStore, ParamStore, PersistStats, StoreError,
};
pub use pid::PidEngine;
pub use window::{PerformanceWindow, PERFORMANCE_WINDOW};
