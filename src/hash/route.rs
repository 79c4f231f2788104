//! Hash backend route arena record (§3 "Hash-specific data", §4.4).

use std::sync::atomic::AtomicU64;

use crate::types::af::AddressFamily;

/// One stored route, living in the hash backend's route arena and chained
/// into exactly one bucket via `prev`/`next`. `0` means "none" on both
/// links, consistent with the arena's reserved sentinel index.
///
/// `hit_count` is an `AtomicU64` for the same reason as
/// [`crate::trie::node::TrieRoute`]: lookups only hold the backend's read
/// lock and must bump it without a lock upgrade.
#[derive(Debug)]
pub struct HashRoute<AF: AddressFamily> {
    pub prefix: AF,
    pub prefix_length: u8,
    pub user_value: u64,
    pub hit_count: AtomicU64,
    pub prev: u32,
    pub next: u32,
}

impl<AF: AddressFamily> Default for HashRoute<AF> {
    fn default() -> Self {
        Self {
            prefix: AF::zero(),
            prefix_length: 0,
            user_value: 0,
            hit_count: AtomicU64::new(0),
            prev: 0,
            next: 0,
        }
    }
}

impl<AF: AddressFamily> HashRoute<AF> {
    pub fn snapshot(&self) -> (AF, u8, u64, u64, u32, u32) {
        (
            self.prefix,
            self.prefix_length,
            self.user_value,
            self.hit_count.load(std::sync::atomic::Ordering::Relaxed),
            self.prev,
            self.next,
        )
    }
}
