/*!
 * Thread Profile Registry
 *
 * Per-thread adaptive spin state kept in a fixed table.
 *
 * # Design: Fixed Table Over Map
 *
 * Lookups run on every wait, so the registry is a fixed array scanned
 * linearly for the caller's identity token, with a monotonic claim counter
 * for new threads. No locks and no allocation after construction. Once every
 * slot is taken, the claim counter wraps and evicts whichever thread held the
 * slot; the evicted thread simply re-registers on its next wait.
 *
 * # Feedback
 *
 * Workers run an additive controller: a wait that succeeded while spinning
 * shrinks the budget by one, a wait that had to block grows it by one. The
 * budget settles near the smallest spin count that avoids blocking under the
 * thread's own contention pattern. The main thread is pinned to the maximum.
 */

use super::config::SyncConfig;
use super::identity::current_token;
use crate::core::limits::MAX_TRACKED_THREADS;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use tracing::debug;

const VACANT: u64 = 0;

/// Scheduling role of a tracked thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// First thread observed; latency over fairness
    Main,
    /// Every other thread; trades latency for throughput
    Worker,
}

impl Role {
    #[inline(always)]
    const fn to_u8(self) -> u8 {
        match self {
            Role::Worker => 0,
            Role::Main => 1,
        }
    }

    #[inline(always)]
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Role::Main,
            _ => Role::Worker,
        }
    }
}

/// Adaptive state of one thread
#[repr(C, align(64))] // Cache-line aligned: each profile is written by its own thread
pub struct ThreadProfile {
    owner: AtomicU64,
    spin_budget: AtomicU32,
    role: AtomicU8,
    is_bound: AtomicBool,
    success_count: AtomicU64,
    wait_count: AtomicU64,
}

impl ThreadProfile {
    const fn vacant() -> Self {
        Self {
            owner: AtomicU64::new(VACANT),
            spin_budget: AtomicU32::new(0),
            role: AtomicU8::new(Role::Worker.to_u8()),
            is_bound: AtomicBool::new(false),
            success_count: AtomicU64::new(0),
            wait_count: AtomicU64::new(0),
        }
    }

    fn bind(&self, token: u64, role: Role, budget: u32) {
        self.role.store(role.to_u8(), Ordering::Relaxed);
        self.spin_budget.store(budget, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        self.wait_count.store(0, Ordering::Relaxed);
        self.is_bound.store(true, Ordering::Relaxed);
        self.owner.store(token, Ordering::Release);
    }

    #[inline]
    pub fn role(&self) -> Role {
        Role::from_u8(self.role.load(Ordering::Relaxed))
    }

    /// Current spin budget
    #[inline]
    pub fn spin_budget(&self) -> u32 {
        self.spin_budget.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn wait_count(&self) -> u64 {
        self.wait_count.load(Ordering::Relaxed)
    }

    /// True once a thread has claimed this slot
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.is_bound.load(Ordering::Relaxed)
    }

    /// Identity token of the owning thread
    #[inline]
    pub fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            owner: self.owner(),
            role: self.role(),
            spin_budget: self.spin_budget(),
            success_count: self.success_count(),
            wait_count: self.wait_count(),
        }
    }
}

/// Point-in-time copy of a profile for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub owner: u64,
    pub role: Role,
    pub spin_budget: u32,
    pub success_count: u64,
    pub wait_count: u64,
}

/// Fixed-capacity table of thread profiles
pub struct ThreadProfileRegistry {
    profiles: Box<[ThreadProfile; MAX_TRACKED_THREADS]>,
    next: AtomicUsize,
    main_token: AtomicU64,
    min_spin: u32,
    max_spin: u32,
}

impl ThreadProfileRegistry {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            profiles: Box::new([const { ThreadProfile::vacant() }; MAX_TRACKED_THREADS]),
            next: AtomicUsize::new(0),
            main_token: AtomicU64::new(VACANT),
            min_spin: config.min_spin,
            max_spin: config.max_spin,
        }
    }

    /// Profile of the calling thread, created on first use
    #[inline]
    pub fn profile(&self) -> &ThreadProfile {
        let token = current_token();

        if let Some(profile) = self.profiles.iter().find(|p| p.owner() == token) {
            return profile;
        }

        self.claim(token)
    }

    #[cold]
    fn claim(&self, token: u64) -> &ThreadProfile {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % MAX_TRACKED_THREADS;
        let profile = &self.profiles[index];

        // The first thread to get here owns Main for the registry's lifetime
        let role = match self.main_token.compare_exchange(
            VACANT,
            token,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Role::Main,
            Err(main) if main == token => Role::Main,
            Err(_) => Role::Worker,
        };

        let budget = match role {
            Role::Main => self.max_spin,
            Role::Worker => self.min_spin,
        };

        let evicted = profile.owner();
        profile.bind(token, role, budget);

        debug!(
            slot = index,
            token,
            ?role,
            spin_budget = budget,
            evicted,
            "Thread profile bound"
        );

        profile
    }

    /// Feed the outcome of one wait back into the profile
    ///
    /// `succeeded` takes precedence over `blocked`; both false is a no-op.
    #[inline]
    pub fn record_outcome(&self, profile: &ThreadProfile, succeeded: bool, blocked: bool) {
        if profile.role() == Role::Main {
            profile.spin_budget.store(self.max_spin, Ordering::Relaxed);
            return;
        }

        if succeeded {
            profile.success_count.fetch_add(1, Ordering::Relaxed);
            let floor = self.min_spin;
            let _ = profile
                .spin_budget
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| {
                    Some(b.saturating_sub(1).max(floor))
                });
        } else if blocked {
            profile.wait_count.fetch_add(1, Ordering::Relaxed);
            let ceiling = self.max_spin;
            let _ = profile
                .spin_budget
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| {
                    Some(b.saturating_add(1).min(ceiling))
                });
        }
    }

    /// Number of slots currently bound to a thread
    pub fn bound_count(&self) -> usize {
        self.profiles.iter().filter(|p| p.is_bound()).count()
    }

    /// Table capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        MAX_TRACKED_THREADS
    }

    /// Copy out every bound profile
    pub fn snapshot(&self) -> Vec<ProfileSnapshot> {
        self.profiles
            .iter()
            .filter(|p| p.is_bound())
            .map(ThreadProfile::snapshot)
            .collect()
    }
}

impl Default for ThreadProfileRegistry {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}
