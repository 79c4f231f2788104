//! Trie node and route arena records (§3, "Trie-specific data").

use std::sync::atomic::AtomicU64;

/// One node of the binary trie. `0` in any link field means "none"; index
/// `0` of the node arena itself is the reserved sentinel and is never a
/// real node.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrieNode {
    /// Index into the route arena, or 0 if no route is attached here.
    pub route_index: u32,
    pub left: u32,
    pub right: u32,
    pub parent: u32,
}

/// One stored route, referenced by a trie node's `route_index`.
///
/// `hit_count` lives directly on the arena slot as an `AtomicU64` so that
/// lookups, which hold only the backend's *read* lock, can
/// `fetch_add(1, Relaxed)` through a shared `&TrieRoute` without any
/// lock upgrade (§4.3 LPM, §9 "Hit counter without a lock").
#[derive(Debug, Default)]
pub struct TrieRoute {
    /// Index of the trie node that owns this route, so a route can be
    /// relocated by the arena's "move last into freed slot" discipline
    /// (§9) without walking the tree to find it.
    pub parent_node: u32,
    pub user_value: u64,
    pub hit_count: AtomicU64,
}

impl TrieRoute {
    /// Copies this route's state into a plain value, for the "move last
    /// into freed slot" relocation the arena demands on delete. `AtomicU64`
    /// is intentionally not `Clone` (an atomic snapshot copy must be
    /// explicit), so this method is the one place that copy happens.
    pub fn snapshot(&self) -> (u32, u64, u64) {
        (
            self.parent_node,
            self.user_value,
            self.hit_count.load(std::sync::atomic::Ordering::Relaxed),
        )
    }
}
