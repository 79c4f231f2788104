//! Page-granular, lazily-physically-backed slot allocator (§4.1).
//!
//! Every arena-indexed structure in this crate (trie nodes, trie routes,
//! hash routes, hash buckets, enumeration-tree nodes) sits on top of one of
//! these (§4.1/§9). Indices are handed out `0, 1, 2, ...` with no gaps,
//! index `0` is a reserved sentinel meaning "none", and only the most
//! recently allocated index may ever be freed — so deleting anything but
//! the last slot is implemented by the caller as "move the last slot's
//! contents into the freed one, then free the last", with every incoming
//! reference to the moved slot rewritten by the caller (§9, "Only free the
//! last slot").
//!
//! This mirrors the role `rotonda-store`'s `local_array/store/custom_alloc.rs`
//! fills (arena-indexed node/prefix storage with an explicit `Counters`
//! struct tracking allocation and a `log_enabled!` guard before formatting
//! trace output), adapted to this crate's single-writer-lock model: there is
//! no lock-free compare-and-swap here, the arena's own invariants are
//! upheld entirely by callers holding the backend's write lock.
//!
//! Huge-page hints and true OS-level page discard (`MADV_DONTNEED`) are
//! external, advisory-only collaborators (§1); this implementation accounts
//! for committed pages faithfully (so `table_info()` reports them
//! correctly) without reaching for unsafe, platform-specific syscalls.

use log::debug;

use crate::types::errors::FatalError;

/// 4 KiB, the page granularity used for physical-memory accounting.
pub const PAGE_SIZE: usize = 4096;

/// A fixed-slot-size arena over index `0..max_slots`. Index `0` is reserved
/// as the "none" sentinel and is never handed out by [`Arena::allocate_index`].
#[derive(Debug)]
pub struct Arena<T> {
    slot_size: usize,
    max_slots: u32,
    preallocate_physical: bool,
    storage: Vec<T>,
    /// Number of slots ever allocated, including the reserved index 0.
    /// The next call to `allocate_index` will hand out `high_water`.
    high_water: u32,
    /// Pages currently considered physically committed.
    committed_pages: usize,
}

impl<T: Default> Arena<T> {
    /// Reserves virtual space for `max_slots` slots of `T` (rounded up to a
    /// page) and reserves index 0 as the sentinel. If `preallocate_physical`
    /// is set, the whole region is committed up front and never discarded.
    pub fn new(max_slots: u32, preallocate_physical: bool) -> Self {
        let slot_size = std::mem::size_of::<T>().max(1);
        debug!(
            "arena: init slot_size={slot_size} max_slots={max_slots} \
             prealloc={preallocate_physical} (huge pages recommended, advisory only)"
        );
        let mut storage = Vec::with_capacity(max_slots as usize);
        storage.push(T::default()); // index 0, sentinel

        let committed_pages = if preallocate_physical {
            pages_for(max_slots as usize * slot_size)
        } else {
            pages_for(slot_size)
        };

        Self {
            slot_size,
            max_slots,
            preallocate_physical,
            storage,
            high_water: 1,
            committed_pages,
        }
    }

    /// Allocates the next free slot index. Fails with `None` (mapped by the
    /// caller to `LpmError::CapacityExceeded`) once `high_water` reaches
    /// `max_slots`.
    pub fn allocate_index(&mut self) -> Option<u32> {
        if self.high_water >= self.max_slots {
            return None;
        }
        let idx = self.high_water;
        self.storage.push(T::default());
        self.high_water += 1;
        if !self.preallocate_physical {
            self.committed_pages =
                pages_for(self.high_water as usize * self.slot_size);
        }
        Some(idx)
    }

    /// Frees the most recently allocated slot. Returns `Err` if nothing
    /// beyond the sentinel is allocated (`LpmError`/internal `Empty`).
    pub fn free_last(&mut self) -> Result<(), FatalError> {
        if self.high_water <= 1 {
            return Err(FatalError("arena: free_last on an empty arena"));
        }
        self.storage.pop();
        self.high_water -= 1;
        if !self.preallocate_physical {
            self.committed_pages =
                pages_for(self.high_water as usize * self.slot_size);
        }
        Ok(())
    }

    /// Returns the most recently allocated index, or `Err` if only the
    /// sentinel exists.
    pub fn last_used_index(&self) -> Result<u32, FatalError> {
        if self.high_water <= 1 {
            Err(FatalError("arena: last_used_index on an empty arena"))
        } else {
            Ok(self.high_water - 1)
        }
    }

    pub fn get(&self, idx: u32) -> &T {
        &self.storage[idx as usize]
    }

    pub fn get_mut(&mut self, idx: u32) -> &mut T {
        &mut self.storage[idx as usize]
    }

    pub fn len(&self) -> u32 {
        self.high_water
    }

    pub fn is_empty(&self) -> bool {
        self.high_water <= 1
    }

    pub fn physical_bytes(&self) -> u64 {
        (self.committed_pages * PAGE_SIZE) as u64
    }

    pub fn virtual_bytes(&self) -> u64 {
        pages_for(self.max_slots as usize * self.slot_size) as u64
            * PAGE_SIZE as u64
    }
}

fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE).max(1)
}
