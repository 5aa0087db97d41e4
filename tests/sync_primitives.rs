/*!
 * Synchronization Primitives Tests
 * Pool distribution, spin budget feedback, pacing and configuration
 */

use adaptive_sync::core::sync::{AutoResetEvent, Pace, WaitHandlePool};
use adaptive_sync::{
    AdaptiveWaiter, PauseStrategy, Role, SyncConfig, SyncError, ThreadProfileRegistry,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serial_test::serial;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_pool_round_robin_across_threads() {
    let pool = Arc::new(WaitHandlePool::new());
    let counts: Arc<Vec<AtomicUsize>> = Arc::new((0..pool.len()).map(|_| AtomicUsize::new(0)).collect());
    let threads = 8;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = pool.clone();
            let counts = counts.clone();
            thread::spawn(move || {
                for _ in 0..pool.len() {
                    let handle = pool.acquire();
                    assert!(handle.index() < pool.len());
                    counts[handle.index()].fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // threads * len acquisitions spread evenly over len slots
    for count in counts.iter() {
        assert_eq!(count.load(Ordering::Relaxed), threads);
    }
}

#[test]
fn test_degraded_slot_waits_return_immediately() {
    let pool = WaitHandlePool::with_factory(|index| {
        if index == 0 {
            Err(SyncError::HandleCreation {
                index,
                reason: "no kernel objects left".into(),
            })
        } else {
            Ok(AutoResetEvent::new())
        }
    });
    assert_eq!(pool.degraded_slots(), 1);

    let waiter = AdaptiveWaiter::with_pool(SyncConfig::default(), pool).unwrap();
    let word = AtomicU32::new(3);

    // First acquisition lands on the degraded slot 0
    let start = Instant::now();
    let outcome = waiter.wait_detailed(&word, 3, Duration::from_secs(5));

    assert!(!outcome.changed);
    assert!(outcome.blocked);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_fast_path_all_widths() {
    let waiter = AdaptiveWaiter::new(SyncConfig::default()).unwrap();
    let timeout = Duration::from_millis(1);

    let outcome = waiter.wait_detailed(&AtomicU8::new(1), 0, timeout);
    assert_eq!((outcome.changed, outcome.spins, outcome.blocked), (true, 0, false));

    let outcome = waiter.wait_detailed(&AtomicU16::new(1), 0, timeout);
    assert_eq!((outcome.changed, outcome.spins, outcome.blocked), (true, 0, false));

    let outcome = waiter.wait_detailed(&AtomicU64::new(1), 0, timeout);
    assert_eq!((outcome.changed, outcome.spins, outcome.blocked), (true, 0, false));

    let outcome = waiter.wait_detailed(&AtomicUsize::new(1), 0, timeout);
    assert_eq!((outcome.changed, outcome.spins, outcome.blocked), (true, 0, false));
}

#[test]
fn test_change_seen_while_spinning() {
    let waiter = Arc::new(AdaptiveWaiter::new(SyncConfig::default()).unwrap());
    let word = Arc::new(AtomicU64::new(0));

    let setter = {
        let word = word.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            word.store(42, Ordering::Release);
        })
    };

    let start = Instant::now();
    while !waiter.wait(&*word, 0, Duration::from_millis(1)) {
        assert!(start.elapsed() < Duration::from_secs(5));
    }
    setter.join().unwrap();
    assert_eq!(word.load(Ordering::Acquire), 42);
}

#[test]
fn test_random_outcomes_keep_budget_bounded() {
    let registry = ThreadProfileRegistry::default();
    let _ = registry.profile();
    let mut rng = StdRng::seed_from_u64(7);
    let outcomes: Vec<(bool, bool)> = (0..5_000).map(|_| (rng.gen(), rng.gen())).collect();

    thread::scope(|s| {
        s.spawn(|| {
            let profile = registry.profile();
            for (succeeded, blocked) in &outcomes {
                registry.record_outcome(profile, *succeeded, *blocked);
                let budget = profile.spin_budget();
                assert!((32..=1024).contains(&budget), "budget {budget} out of range");
            }
        });
    });
}

proptest! {
    #[test]
    fn prop_worker_budget_stays_in_bounds(outcomes in prop::collection::vec((any::<bool>(), any::<bool>()), 0..400)) {
        let registry = ThreadProfileRegistry::default();
        let main = registry.profile();

        thread::scope(|s| {
            s.spawn(|| {
                let profile = registry.profile();
                assert_eq!(profile.role(), Role::Worker);
                for (succeeded, blocked) in &outcomes {
                    registry.record_outcome(profile, *succeeded, *blocked);
                    assert!((32..=1024).contains(&profile.spin_budget()));
                }
            });
        });

        for (succeeded, blocked) in &outcomes {
            registry.record_outcome(main, *succeeded, *blocked);
        }
        prop_assert_eq!(main.role(), Role::Main);
        prop_assert_eq!(main.spin_budget(), 1024);
    }

    #[test]
    fn prop_pause_counts_never_decrease(a in 0u32..4096, b in 0u32..4096) {
        let pause = PauseStrategy::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        for role in [Role::Main, Role::Worker] {
            if let (Pace::Pause(x), Pace::Pause(y)) = (pause.plan(role, low), pause.plan(role, high)) {
                prop_assert!(x <= y, "{:?}: spin {} paces {} but spin {} paces {}", role, low, x, high, y);
            }
        }
        prop_assert!(pause.plan(Role::Main, high) != Pace::Yield);
    }
}

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("SYNC_MIN_SPIN", "64");
    std::env::set_var("SYNC_MAX_SPIN", "512");
    std::env::set_var("SYNC_WAIT_TIMEOUT_US", "250");
    std::env::set_var("SYNC_PARK_AFTER_ROUNDS", "not-a-number");

    let config = SyncConfig::from_env().unwrap();
    assert_eq!(config.min_spin, 64);
    assert_eq!(config.max_spin, 512);
    assert_eq!(config.wait_timeout, Duration::from_micros(250));
    // Unparseable values fall back to the default
    assert_eq!(config.park_after_rounds, SyncConfig::default().park_after_rounds);

    for key in [
        "SYNC_MIN_SPIN",
        "SYNC_MAX_SPIN",
        "SYNC_WAIT_TIMEOUT_US",
        "SYNC_PARK_AFTER_ROUNDS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_config_from_env_rejects_inverted_bounds() {
    std::env::set_var("SYNC_MIN_SPIN", "2048");

    let result = SyncConfig::from_env();
    std::env::remove_var("SYNC_MIN_SPIN");

    assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
}

#[test]
fn test_presets_validate() {
    assert!(SyncConfig::low_latency().validate().is_ok());
    assert!(SyncConfig::power_saving().validate().is_ok());

    let waiter = AdaptiveWaiter::new(SyncConfig::power_saving()).unwrap();
    assert_eq!(waiter.registry().profile().spin_budget(), 256);
}
