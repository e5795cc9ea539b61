//! Integration tests for the gain store and its persisted representation

use level_assist::gains::GAIN_NAMESPACE;
use level_assist::{AssistConfig, GainStore, LevelAssistant, MemoryStore, ParamStore};
use std::time::{Duration, Instant};

// ============================================================================
// BOUNDED SETTERS
// ============================================================================

#[test]
fn test_setters_accept_in_range_values() {
    let mut store = GainStore::new();
    assert!(store.set_kp(5.0));
    assert!(store.set_ki(0.33));
    assert!(store.set_kd(0.07));
    assert!(store.set_output_max(64.0));

    assert_eq!(store.kp(), 5.0);
    assert_eq!(store.ki(), 0.33);
    assert_eq!(store.kd(), 0.07);
    assert_eq!(store.output_max(), 64.0);
}

#[test]
fn test_out_of_range_values_are_silently_ignored() {
    let mut store = GainStore::new();
    let before = store.gains();

    assert!(!store.set_kp(-0.1));
    assert!(!store.set_kp(10.1));
    assert!(!store.set_kp(f32::NAN));
    assert!(!store.set_ki(2.5));
    assert!(!store.set_kd(1.5));
    assert!(!store.set_output_max(5.0));
    assert!(!store.set_output_max(101.0));

    assert_eq!(store.gains(), before);
}

#[test]
fn test_changing_kp_or_ki_zeroes_live_integrator() {
    let mut assistant = LevelAssistant::new(AssistConfig::default());
    let base = Instant::now();

    for i in 0..10u64 {
        assistant.process(127, -200, true, base + Duration::from_millis(i * 10));
    }
    assert!(assistant.snapshot().integral > 0.0);

    assistant.set_kp(0.5);
    assert_eq!(assistant.snapshot().integral, 0.0);

    for i in 20..30u64 {
        assistant.process(127, -200, true, base + Duration::from_millis(i * 10));
    }
    let wound = assistant.snapshot().integral;
    assert!(wound > 0.0);

    // Kd changes do not disturb the integrator
    assistant.set_kd(0.05);
    assert_eq!(assistant.snapshot().integral, wound);

    assistant.set_ki(0.2);
    assert_eq!(assistant.snapshot().integral, 0.0);
}

// ============================================================================
// PERSISTENCE ROUND-TRIP
// ============================================================================

#[test]
fn test_save_then_load_is_bit_identical() {
    let backend = MemoryStore::new();
    let mut store = GainStore::new();
    store.set_kp(1.25);
    store.set_ki(0.33);
    store.set_kd(0.07);
    store.set_output_max(64.0);
    store.save(&backend).expect("save should succeed");

    let mut fresh = GainStore::new();
    assert_eq!(fresh.load(&backend), Ok(true));
    assert_eq!(fresh.gains(), store.gains());
    assert!(fresh.learned());
}

#[test]
fn test_load_without_data_keeps_defaults() {
    let backend = MemoryStore::new();
    let mut store = GainStore::new();

    assert_eq!(store.load(&backend), Ok(false));
    assert_eq!(store.gains(), GainStore::new().gains());
    assert!(!store.learned());
}

#[test]
fn test_corrupt_record_falls_back_to_defaults() {
    let backend = MemoryStore::new();
    backend.set(GAIN_NAMESPACE, "learned", &[1]).unwrap();
    backend.set(GAIN_NAMESPACE, "gains", &[1, 2, 3]).unwrap();

    let mut store = GainStore::new();
    assert_eq!(store.load(&backend), Ok(false));
    assert_eq!(store.gains(), GainStore::new().gains());
}

#[test]
fn test_unlearned_flag_means_no_data() {
    let backend = MemoryStore::new();
    let store = GainStore::new();
    store.save(&backend).unwrap();
    backend.set(GAIN_NAMESPACE, "learned", &[0]).unwrap();

    let mut fresh = GainStore::new();
    assert_eq!(fresh.load(&backend), Ok(false));
}

#[test]
fn test_reset_to_defaults_erases_learned_set() {
    let backend = MemoryStore::new();
    let mut store = GainStore::new();
    store.set_kp(1.5);
    store.save(&backend).unwrap();

    store.reset_to_defaults(&backend).expect("erase should succeed");
    assert_eq!(store.gains(), GainStore::new().gains());
    assert!(!store.learned());

    let mut fresh = GainStore::new();
    assert_eq!(fresh.load(&backend), Ok(false));
}
