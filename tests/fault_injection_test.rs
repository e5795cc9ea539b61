//! Fault injection tests for the persistence path

use level_assist::{
    save_channel, spawn_persistence_worker, GainSet, GainStore, MemoryStore, ParamStore, StoreError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_save_reports_write_fault() {
    let backend = MemoryStore::new();
    backend.set_fail_writes(true);

    let mut store = GainStore::new();
    store.set_kp(1.0);
    let result = store.save(&backend);
    assert!(matches!(result, Err(StoreError::WriteFailed(_))));

    // In-memory values stay authoritative after a failed save
    assert_eq!(store.kp(), 1.0);
}

#[test]
fn test_worker_counts_failed_and_successful_saves() {
    let backend = Arc::new(MemoryStore::new());
    backend.set_fail_writes(true);

    let (tx, rx) = save_channel(4);
    let (handle, stats) = spawn_persistence_worker(backend.clone() as Arc<dyn ParamStore>, rx);

    let mut adapted = GainSet::default();
    adapted.ki = 0.25;
    tx.send(adapted).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(stats.saves_failed.load(Ordering::Relaxed) >= 1);
    assert_eq!(stats.saves_ok.load(Ordering::Relaxed), 0);

    // Storage recovers; the next request lands
    backend.set_fail_writes(false);
    tx.send(adapted).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert!(stats.saves_ok.load(Ordering::Relaxed) >= 1);

    stats.shutdown.store(true, Ordering::Relaxed);
    drop(tx);
    handle.join().unwrap();

    let mut loaded = GainStore::new();
    assert_eq!(loaded.load(backend.as_ref()), Ok(true));
    assert_eq!(loaded.gains(), adapted);
}
