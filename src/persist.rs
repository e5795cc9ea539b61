//! Persistence module - Parameter storage contract and the deferred save worker

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::gains::{GainSet, GainStore};

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Faults of the underlying storage medium. Absence of a key is not an
/// error; `ParamStore::get` reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage backend unavailable")]
    Unavailable,
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
}

// ============================================================================
// PARAM STORE - Key-value persistence collaborator
// ============================================================================

pub trait ParamStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Remove every key in the namespace.
    fn erase(&self, namespace: &str) -> Result<(), StoreError>;
}

// ============================================================================
// MEMORY STORE - In-process backend with write-fault injection
// ============================================================================

#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent write fail, for fault-injection tests.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.lock();
        Ok(data.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::WriteFailed("injected write fault".to_string()));
        }
        let mut data = self.data.lock();
        data.insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn erase(&self, namespace: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::WriteFailed("injected write fault".to_string()));
        }
        let mut data = self.data.lock();
        data.retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}

// ============================================================================
// PERSISTENCE WORKER - Drains deferred save requests off the control path
// ============================================================================

pub struct PersistStats {
    pub saves_ok: AtomicU64,
    pub saves_failed: AtomicU64,
    pub shutdown: AtomicBool,
}

impl PersistStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            saves_ok: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }
}

/// Bounded channel carrying adapted gain snapshots to the worker.
pub fn save_channel(buffer_size: usize) -> (Sender<GainSet>, Receiver<GainSet>) {
    bounded(buffer_size)
}

/// Spawn the low-priority thread that commits adapted gains to storage.
/// Keeps slow writes out of the per-tick control path; a failed save is
/// counted and logged while the in-memory gains stay authoritative.
pub fn spawn_persistence_worker(
    store: Arc<dyn ParamStore>,
    rx: Receiver<GainSet>,
) -> (thread::JoinHandle<()>, Arc<PersistStats>) {
    let stats = PersistStats::new();
    let stats_clone = stats.clone();

    let handle = thread::spawn(move || {
        loop {
            if stats_clone.shutdown.load(Ordering::Relaxed) {
                break;
            }

            // Timeout lets the shutdown flag be observed
            let gains = match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(g) => g,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let snapshot = GainStore::with_learned_gains(gains);
            match snapshot.save(store.as_ref()) {
                Ok(()) => {
                    stats_clone.saves_ok.fetch_add(1, Ordering::Relaxed);
                    debug!("persisted adapted gains: {:?}", gains);
                }
                Err(e) => {
                    stats_clone.saves_failed.fetch_add(1, Ordering::Relaxed);
                    warn!("deferred gain save failed: {}", e);
                }
            }
        }
    });

    (handle, stats)
}
