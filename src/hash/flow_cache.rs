//! IPv6 destination flow cache (§4.6).
//!
//! A fixed-size, direct-mapped cache from destination address to the route
//! that last matched it, so that repeat lookups for the same /128
//! destination skip the full longest-prefix-match walk. Each cell carries
//! its own try-lock so a miss on one flow never blocks a hit on another;
//! grounded in the original `lpmht` sources' flow-cache cells (one
//! test-and-set word per cell, no table-wide lock) and, in spirit, the
//! teacher's per-stride atomic bitmaps in `local_array/in_memory/atomic_stride.rs`
//! that use a single compare-exchange instead of a full mutex per update.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use log::debug;

/// One flow-cache cell. `locked` is a spinlock bit guarding the rest of
/// the cell's fields; `epoch` records the backend's routing epoch at the
/// time this entry was learned, so a cell can be recognized as stale
/// without a table-wide invalidation sweep (§4.6 "Epoch invalidation").
/// `recently_seen` is set on every hit and is what the age sweeper's
/// CLOCK-style pass actually consults (§3 "IPv6 flow cache", §4.6 "Age
/// sweeper thread") — a cell survives one sweep untouched after a hit,
/// and is evicted on the next if it wasn't hit again meanwhile.
struct FlowCell {
    locked: AtomicBool,
    occupied: AtomicBool,
    recently_seen: AtomicBool,
    addr_hi: AtomicU64,
    addr_lo: AtomicU64,
    route_index: AtomicU32,
    epoch: AtomicU32,
}

impl Default for FlowCell {
    fn default() -> Self {
        Self {
            locked: AtomicBool::new(false),
            occupied: AtomicBool::new(false),
            recently_seen: AtomicBool::new(false),
            addr_hi: AtomicU64::new(0),
            addr_lo: AtomicU64::new(0),
            route_index: AtomicU32::new(0),
            epoch: AtomicU32::new(0),
        }
    }
}

/// Outcome of a flow-cache probe (§4.6 "Match").
pub enum FlowLookup {
    /// A fresh entry matched this destination and epoch; use `route_index`
    /// directly without a full LPM walk.
    Hit { route_index: u32 },
    /// The cell was busy (another thread holds its try-lock), stale
    /// (recorded epoch doesn't match), or simply not present. The caller
    /// falls back to the ordinary LPM path and may `learn` the result.
    Miss,
}

/// A fixed-size table of [`FlowCell`]s keyed by `addr % len`, plus the
/// background age sweeper that evicts cells nobody has hit recently. Each
/// cell is [`CachePadded`] since adjacent destinations hashing into
/// neighboring cells are looked up from unrelated reader threads; without
/// padding their try-lock bits would share a cache line and false-share
/// under concurrent load.
pub struct FlowCache {
    cells: Vec<CachePadded<FlowCell>>,
}

impl FlowCache {
    pub fn new(cell_count: usize) -> Self {
        let cell_count = cell_count.max(1);
        let mut cells = Vec::with_capacity(cell_count);
        cells.resize_with(cell_count, || CachePadded::new(FlowCell::default()));
        debug!("ipv6 flow cache: {cell_count} cells");
        Self { cells }
    }

    pub fn byte_size(&self) -> usize {
        self.cells.len() * std::mem::size_of::<CachePadded<FlowCell>>()
    }

    fn index_for(&self, addr: u128) -> usize {
        (addr % self.cells.len() as u128) as usize
    }

    /// Attempts to serve `addr` from the cache at `current_epoch`. Never
    /// blocks: if the cell's try-lock is already held, this is a miss
    /// exactly like a genuine cache miss (§4.6 "best-effort, no waiting").
    pub fn lookup(&self, addr: u128, current_epoch: u32) -> FlowLookup {
        let cell = &self.cells[self.index_for(addr)];
        if cell
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return FlowLookup::Miss;
        }
        let result = if cell.occupied.load(Ordering::Relaxed)
            && cell.epoch.load(Ordering::Relaxed) == current_epoch
            && cell.addr_hi.load(Ordering::Relaxed) == (addr >> 64) as u64
            && cell.addr_lo.load(Ordering::Relaxed) == addr as u64
        {
            cell.recently_seen.store(true, Ordering::Relaxed);
            FlowLookup::Hit {
                route_index: cell.route_index.load(Ordering::Relaxed),
            }
        } else {
            FlowLookup::Miss
        };
        cell.locked.store(false, Ordering::Release);
        result
    }

    /// Records that `addr` resolved to `route_index` at `current_epoch`,
    /// overwriting whatever the cell held. Skips silently if the cell is
    /// momentarily busy, the same best-effort contract as `lookup`.
    pub fn learn(&self, addr: u128, route_index: u32, current_epoch: u32) {
        let cell = &self.cells[self.index_for(addr)];
        if cell
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        cell.addr_hi.store((addr >> 64) as u64, Ordering::Relaxed);
        cell.addr_lo.store(addr as u64, Ordering::Relaxed);
        cell.route_index.store(route_index, Ordering::Relaxed);
        cell.epoch.store(current_epoch, Ordering::Relaxed);
        cell.occupied.store(true, Ordering::Relaxed);
        cell.recently_seen.store(true, Ordering::Relaxed);
        cell.locked.store(false, Ordering::Release);
    }

    /// One CLOCK-style age-sweep pass over every cell (§4.6 "Age sweeper
    /// thread"): try-lock; if `recently_seen` is set, clear it (giving the
    /// cell one more sweep to be touched again); else if it holds a route,
    /// evict it. Busy cells are skipped, the same best-effort contract as
    /// `lookup`/`learn`.
    fn sweep_once(&self) {
        for cell in &self.cells {
            if cell
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }
            if cell.recently_seen.load(Ordering::Relaxed) {
                cell.recently_seen.store(false, Ordering::Relaxed);
            } else if cell.route_index.load(Ordering::Relaxed) != 0 {
                cell.route_index.store(0, Ordering::Relaxed);
                cell.occupied.store(false, Ordering::Relaxed);
            }
            cell.locked.store(false, Ordering::Release);
        }
    }
}

/// Handle to the background age-sweeper thread for one IPv6 flow cache.
pub struct FlowSweeperHandle {
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl FlowSweeperHandle {
    pub fn stop_and_join(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawns the sweeper that runs every `age_period` seconds, clearing
/// `recently_seen` on untouched-but-hit cells and evicting cells that were
/// already clear of it (§4.6 "Age sweeper thread"). Needs no lock on the
/// backend at all — every field it touches lives on the cells themselves.
pub fn spawn_flow_sweeper(
    cache: Arc<FlowCache>,
    age_period: Duration,
    stop: Arc<AtomicBool>,
) -> FlowSweeperHandle {
    let thread_stop = stop.clone();
    let join = std::thread::Builder::new()
        .name("lpm-ipv6-flow-sweeper".into())
        .spawn(move || {
            debug!("ipv6 flow sweeper: started, period={age_period:?}");
            loop {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(age_period);
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                cache.sweep_once();
            }
            debug!("ipv6 flow sweeper: stopped");
        })
        .expect("failed to spawn ipv6 flow-sweeper thread");

    FlowSweeperHandle {
        stop,
        join: Some(join),
    }
}
