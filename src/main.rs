use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod adaptive;
mod assistant;
mod config;
mod gains;
mod persist;
mod pid;
mod window;

use assistant::{AssistMode, LevelAssistant};
use config::load_config;
use persist::{save_channel, spawn_persistence_worker, MemoryStore, ParamStore};

const TICK: Duration = Duration::from_millis(10);
const NEUTRAL: u8 = 127;

fn main() {
    env_logger::init();

    println!("===========================================");
    println!("Level-Assist Controller Simulation");
    println!("===========================================\n");

    let cfg = load_config("config/assist.toml");
    let store = Arc::new(MemoryStore::new());

    let mut assistant = LevelAssistant::new(cfg);
    match assistant.load_gains(store.as_ref()) {
        Ok(true) => println!("Loaded learned gains from storage"),
        Ok(false) => println!("No learned gains found, using factory defaults"),
        Err(e) => println!("Gain load failed ({}), using factory defaults", e),
    }

    let (save_tx, save_rx) = save_channel(16);
    assistant.attach_persistence(save_tx);
    let (persist_handle, persist_stats) =
        spawn_persistence_worker(store.clone() as Arc<dyn ParamStore>, save_rx);

    // Simulated plant: the rider cruises, releases the throttle on a hill,
    // and the board starts rolling backwards until the assist arrests it.
    let mut rng = StdRng::seed_from_u64(42);
    let base = Instant::now();
    let mut erpm: f32 = 0.0;
    let mut corrections = 0u64;
    let mut max_correction: u8 = NEUTRAL;

    println!("\nPhase 1: rider cruising (manual input, 2s)");
    for i in 0..200u32 {
        let now = base + TICK * i;
        let throttle = (180i16 + rng.gen_range(-2i16..=2)) as u8;
        erpm = 3000.0 + rng.gen_range(-50.0..50.0);
        let out = assistant.process(throttle, erpm as i32, true, now);
        debug_assert_eq!(out, throttle);
    }
    println!(
        "  mode after cruising: {:?}",
        assistant.snapshot().mode
    );

    println!("\nPhase 2: throttle released on a hill (8s)");
    erpm = 0.0;
    for i in 200..1000u32 {
        let now = base + TICK * i;
        let throttle = (i16::from(NEUTRAL) + rng.gen_range(-1i16..=1)) as u8;
        // Gravity pulls the board backwards; applied correction pushes back
        let out = assistant.process(throttle, erpm as i32, true, now);
        let correction = f32::from(out.saturating_sub(NEUTRAL));
        erpm += -2.0 + 0.08 * correction + rng.gen_range(-0.5..0.5);
        if out > throttle {
            corrections += 1;
            max_correction = max_correction.max(out);
        }
    }

    let snap = assistant.snapshot();
    println!("  final ERPM: {:.1}", erpm);
    println!("  corrections applied: {}", corrections);
    println!("  highest commanded throttle: {}", max_correction);
    println!("  mode: {:?} (manual={})", snap.mode, snap.mode == AssistMode::Manual);
    println!(
        "  window: {} samples, mean |error| {:.2}, variance {:.2}, {} sign flips",
        snap.samples_collected, snap.avg_error, snap.error_variance, snap.oscillation_count
    );
    println!(
        "  gains: kp={:.4} ki={:.4} kd={:.4} out_max={:.1} (learned={})",
        snap.gains.kp, snap.gains.ki, snap.gains.kd, snap.gains.output_max, snap.learned
    );

    println!("\n===========================================");
    println!("Simulation complete - shutting down");
    persist_stats.shutdown.store(true, Ordering::Relaxed);
    let _ = persist_handle.join();

    println!(
        "Persistence worker: {} saves ok, {} failed",
        persist_stats.saves_ok.load(Ordering::Relaxed),
        persist_stats.saves_failed.load(Ordering::Relaxed)
    );
    println!("===========================================");
}
