//! IPv4 rule-table accelerator (§4.5).
//!
//! A direct-indexed, 2^24-entry table over the top 24 bits of an IPv4
//! address, rebuilt from scratch by a single dedicated background thread
//! whenever the live route set changes. While `ready`, a lookup of length
//! <= 24 is a single atomic load instead of a hash-chain walk; grounded in
//! the original `lpmht` sources' rule-table logic embedded in
//! `src-c/hash-lib.c` (allocation/thread-spawn around line 905, the
//! `ipv4_rule_table[...]` probe around line 1450), which trades a fixed
//! 64 MiB block for O(1) worst-case IPv4 lookups.
//!
//! The storage here is written by exactly one thread (the rebuilder) and
//! read by arbitrarily many lookup threads, all of which already hold the
//! backend's read lock for the duration of their call; entries are plain
//! `AtomicU32` so the single writer can publish without needing `&mut
//! self`, matching this module's calling convention of running under a
//! read lock shared with concurrent lookups (`rotonda-store`'s
//! `atomic_stride.rs` uses the same "single updater thread, many atomic
//! readers" shape for its stride-table counters).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::rwlock::TableLock;

/// Number of top bits indexed directly (`log2` of the rule-table size).
pub const RULE_TABLE_BITS: u32 = 24;
pub const RULE_TABLE_SIZE: usize = 1 << RULE_TABLE_BITS;

/// The rule table's storage and readiness bookkeeping. Owned by a hash
/// backend for the IPv4 family only, constructed when `ipv4_rules` is set.
pub struct RuleTableStorage {
    entries: Vec<AtomicU32>,
    ready: AtomicBool,
    rebuild_needed: AtomicBool,
}

impl RuleTableStorage {
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(RULE_TABLE_SIZE);
        entries.resize_with(RULE_TABLE_SIZE, || AtomicU32::new(0));
        Self {
            entries,
            ready: AtomicBool::new(false),
            rebuild_needed: AtomicBool::new(true),
        }
    }

    /// `Some(route_index)` if the table is fully built and the slot is
    /// occupied; `None` if stale (caller should fall back to the normal
    /// hash lookup) or genuinely empty.
    pub fn lookup(&self, key24: u32) -> Option<u32> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let idx = self.entries[key24 as usize].load(Ordering::Relaxed);
        (idx != 0).then_some(idx)
    }

    pub fn store(&self, key24: u32, route_index: u32) {
        self.entries[key24 as usize].store(route_index, Ordering::Relaxed);
    }

    pub fn mark_stale(&self) {
        self.ready.store(false, Ordering::Release);
        self.rebuild_needed.store(true, Ordering::Release);
    }

    pub fn rebuild_needed(&self) -> bool {
        self.rebuild_needed.load(Ordering::Acquire)
    }

    pub fn clear_rebuild_needed(&self) {
        self.rebuild_needed.store(false, Ordering::Release);
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for RuleTableStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the spawned rebuilder thread; dropping/stopping it joins.
pub struct RuleBuilderHandle {
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl RuleBuilderHandle {
    pub fn stop_and_join(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// A hash backend, as seen by the rule builder thread: just enough surface
/// to probe a length-24 lookup and touch the rule-table storage. Kept as a
/// trait so the rebuilder doesn't need to name `HashBackend<AF>` directly
/// (avoids a dependency cycle between `hash::mod` and `hash::rule_table`).
pub trait RuleTableHost: Send + Sync {
    fn rule_table(&self) -> &RuleTableStorage;
    /// Finds the best route of length <= 24 matching `key24`'s top bits,
    /// via the ordinary chained-hash search (never consulting the rule
    /// table itself, to avoid rebuilding from a stale view of itself).
    fn probe_length_24_lpm(&self, key24: u32) -> Option<u32>;
}

/// Spawns the single background rebuilder thread for one IPv4 hash table
/// (§4.5 "Rebuild thread"). Sleeps a fixed period, then only pays the cost
/// of a full 2^24-entry pass when a write has actually marked the table
/// stale since the last pass.
pub fn spawn_rule_builder<H>(
    table: Arc<TableLock<H>>,
    stop: Arc<AtomicBool>,
) -> RuleBuilderHandle
where
    H: RuleTableHost + 'static,
{
    let thread_stop = stop.clone();
    let join = std::thread::Builder::new()
        .name("lpm-ipv4-rule-builder".into())
        .spawn(move || {
            debug!("ipv4 rule builder: started");
            loop {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(Duration::from_secs(1));
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }

                let needs_rebuild = {
                    let backend = table.read();
                    backend.rule_table().rebuild_needed()
                };
                if !needs_rebuild {
                    continue;
                }
                {
                    let backend = table.write();
                    backend.rule_table().clear_rebuild_needed();
                }

                let mut aborted = false;
                for key24 in 0u32..(1 << RULE_TABLE_BITS) {
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let backend = table.read();
                    let found = backend.probe_length_24_lpm(key24).unwrap_or(0);
                    backend.rule_table().store(key24, found);
                    if backend.rule_table().rebuild_needed() {
                        aborted = true;
                    }
                    drop(backend);
                    if aborted {
                        break;
                    }
                }

                if !aborted {
                    let backend = table.write();
                    if !backend.rule_table().rebuild_needed() {
                        backend.rule_table().set_ready();
                        info!("ipv4 rule table rebuild complete");
                    }
                }
            }
            debug!("ipv4 rule builder: stopped");
        })
        .expect("failed to spawn ipv4 rule-builder thread");

    RuleBuilderHandle {
        stop,
        join: Some(join),
    }
}
