/*!
 * Adaptive Sync - Pipeline Demo
 *
 * One producer arms slots and offers them on a shared ring while a set of
 * consumer threads acquire them through the adaptive waiter:
 * - Consumers park on the head sequence when the ring runs dry
 * - The producer wakes parked consumers only when some are blocked
 * - Shutdown wakes everything and prints per-thread profiles as JSON
 */

use adaptive_sync::monitoring::span_worker;
use adaptive_sync::queue::SlotState;
use adaptive_sync::{
    init_tracing, AdaptiveWaiter, CommitTarget, QueueError, Repossession, RingCursor,
    SlotAcquirer, SlotHooks, SyncConfig,
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Bookkeeping hooks counting what the acquisition loop hands back
#[derive(Default)]
struct PipelineHooks {
    commits: AtomicU64,
    published: AtomicU64,
    refill_requests: AtomicU64,
}

impl SlotHooks for PipelineHooks {
    fn refill(&self, _: &RingCursor, _: u32, _: bool) -> Option<Repossession> {
        self.refill_requests.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn commit(&self, _: &RingCursor, _: CommitTarget, _: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    fn publish(&self, _: &RingCursor, _: &Repossession) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize)]
struct Summary {
    items: u64,
    consumed: u64,
    overwritten: u64,
    commits: u64,
    refill_requests: u64,
    elapsed_ms: u128,
    profiles: Vec<adaptive_sync::ProfileSnapshot>,
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} is not a valid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn main() -> Result<()> {
    init_tracing();

    let consumers: usize = env_or("PIPELINE_CONSUMERS", 4)?;
    let items: u64 = env_or("PIPELINE_ITEMS", 10_000)?;
    let deadline = Duration::from_millis(env_or("PIPELINE_DEADLINE_MS", 10_000)?);

    let config = SyncConfig::from_env().context("Invalid sync configuration")?;
    info!(consumers, items, ?config, "Pipeline starting");

    let waiter = Arc::new(AdaptiveWaiter::new(config)?);
    // Bind this thread first so producer and consumers run as workers
    let _ = waiter.registry().profile();

    let ring = Arc::new(RingCursor::new());
    let acquirer = Arc::new(SlotAcquirer::new(
        waiter.clone(),
        Arc::new(PipelineHooks::default()),
    ));
    let consumed = Arc::new(AtomicU64::new(0));
    let overwritten = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let mut consumer_handles = Vec::with_capacity(consumers);

    for index in 0..consumers {
        let ring = ring.clone();
        let acquirer = acquirer.clone();
        let consumed = consumed.clone();
        let handle = thread::Builder::new()
            .name(format!("consumer-{index}"))
            .spawn(move || {
                let span = span_worker("consumer", index);
                let _entered = span.enter();
                while !ring.is_shutdown() {
                    if acquirer.acquire(&ring, true, true).has_reference() {
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .context("Failed to spawn consumer")?;
        consumer_handles.push(handle);
    }

    let producer = {
        let ring = ring.clone();
        let acquirer = acquirer.clone();
        let overwritten = overwritten.clone();
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || {
                let span = span_worker("producer", 0);
                let _entered = span.enter();
                produce(&ring, &acquirer, items, &overwritten, deadline)
            })
            .context("Failed to spawn producer")?
    };
    producer
        .join()
        .map_err(|_| anyhow!("producer thread panicked"))?;

    // Drain whatever the consumers have not taken yet
    while !ring.is_empty() && consumed.load(Ordering::Relaxed) < items {
        if started.elapsed() > deadline {
            warn!(
                consumed = consumed.load(Ordering::Relaxed),
                in_flight = ring.in_flight(),
                "Pipeline deadline reached"
            );
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    acquirer.shutdown(&ring);
    for handle in consumer_handles {
        handle
            .join()
            .map_err(|_| anyhow!("consumer thread panicked"))?;
    }

    let hooks = acquirer.hooks();
    let summary = Summary {
        items,
        consumed: consumed.load(Ordering::Relaxed),
        overwritten: overwritten.load(Ordering::Relaxed),
        commits: hooks.commits.load(Ordering::Relaxed),
        refill_requests: hooks.refill_requests.load(Ordering::Relaxed),
        elapsed_ms: started.elapsed().as_millis(),
        profiles: waiter.registry().snapshot(),
    };

    info!(
        consumed = summary.consumed,
        published = hooks.published.load(Ordering::Relaxed),
        elapsed_ms = summary.elapsed_ms as u64,
        "Pipeline finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Arm and offer `items` slots, reusing table entries once their reference is taken
fn produce(
    ring: &RingCursor,
    acquirer: &SlotAcquirer<Arc<PipelineHooks>>,
    items: u64,
    overwritten: &AtomicU64,
    deadline: Duration,
) {
    let table_len = ring.slots().len() as u64;
    let started = Instant::now();

    for item in 0..items {
        let index = (item % table_len) as u32;
        let epoch = (item / table_len + 1) as u32;

        // Wait for the previous occupant to be taken; a lost descriptor is overwritten
        let busy = |state: SlotState| state.is_live() && state.refs() > 0;
        let reuse_started = Instant::now();
        while ring.slots().state(index).is_some_and(busy) {
            if reuse_started.elapsed() > Duration::from_millis(50) {
                overwritten.fetch_add(1, Ordering::Relaxed);
                break;
            }
            thread::yield_now();
        }

        let slot = match ring.arm_slot(index, epoch, 1) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(error = %e, "Could not arm slot");
                return;
            }
        };

        loop {
            match acquirer.offer(ring, slot) {
                Ok(_) => break,
                Err(QueueError::Full { .. }) if !ring.is_shutdown() => {
                    if started.elapsed() > deadline {
                        return;
                    }
                    thread::yield_now();
                }
                Err(e) => {
                    warn!(error = %e, item, "Producer stopped");
                    return;
                }
            }
        }
    }
}
