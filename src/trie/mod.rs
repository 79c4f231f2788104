//! The binary trie backend (§4.3).
//!
//! A classic 1-bit trie keyed bit-by-bit on the prefix, MSB first, stored
//! in two arenas: [`TrieNode`]s (interior/leaf structure) and [`TrieRoute`]s
//! (the route payloads a node's `route_index` points at). All cross-node
//! references are `u32` arena indices with `0` as the "none" sentinel, in
//! the same cyclic/pointer-rich-structures-as-arena-indices style
//! `rotonda-store`'s tree-bitmap node storage uses (§9 "Cyclic / pointer-
//! rich structures").
//!
//! This backend does not take any lock itself; callers (the façade in
//! [`crate::table`]) hold a [`crate::rwlock::TableLock`] around every call.

pub mod node;

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};

use crate::arena::Arena;
use crate::types::af::AddressFamily;
use crate::types::config::TableConfig;
use crate::types::errors::LpmError;
use crate::types::prefix::PrefixKey;

pub use node::{TrieNode, TrieRoute};

/// The binary trie LPM backend for one address family.
pub struct TrieBackend<AF: AddressFamily> {
    nodes: Arena<TrieNode>,
    routes: Arena<TrieRoute>,
    /// Index of the root node, or 0 if the trie is empty.
    root: u32,
    route_count: u32,
    max_routes: u32,
    hit_count_enabled: bool,
    _af: std::marker::PhantomData<AF>,
}

impl<AF: AddressFamily> TrieBackend<AF> {
    pub fn new(max_routes: u32, config: &TableConfig) -> Self {
        // Worst case every route forces a fresh node at every one of its
        // bits; size the node arena for that, the way the original lpmht
        // trie allocates `max_routes * bits_per_family` nodes up front
        // (trie-lib.c: `max_nodes = max_routes * 32|128`). This is a
        // virtual reservation only (§4.1) so the generous bound costs no
        // physical memory until nodes are actually created.
        let max_nodes =
            (max_routes as u64 * AF::BITS as u64 + 1).min(u32::MAX as u64) as u32;
        debug!(
            "trie: init max_routes={max_routes} max_nodes={max_nodes} \
             hit_count={}",
            config.hit_count
        );
        Self {
            nodes: Arena::new(max_nodes, config.mem_prealloc),
            routes: Arena::new(max_routes + 1, config.mem_prealloc),
            root: 0,
            route_count: 0,
            max_routes,
            hit_count_enabled: config.hit_count,
            _af: std::marker::PhantomData,
        }
    }

    pub fn route_count(&self) -> u32 {
        self.route_count
    }

    pub fn num_internal_nodes(&self) -> u32 {
        self.nodes.len() - 1
    }

    pub fn mem_bytes_physical(&self) -> u64 {
        self.nodes.physical_bytes() + self.routes.physical_bytes()
    }

    pub fn mem_bytes_virtual(&self) -> u64 {
        self.nodes.virtual_bytes() + self.routes.virtual_bytes()
    }

    /// Walk from root, descending `right` on a 1 bit and `left` on a 0 bit,
    /// for exactly `len` steps (§4.3 "Lookup (`nodeFind`)"). Returns the
    /// last visited non-null node and its depth; the caller derives a
    /// match by checking `depth == len`.
    fn node_find(&self, bits: AF, len: u8) -> (u32, u8) {
        let mut cur = self.root;
        let mut depth: u8 = 0;
        let mut last_parent = 0u32;
        let mut last_depth = 0u8;
        if cur != 0 {
            last_parent = cur;
        }
        while depth < len && cur != 0 {
            let bit = bits.bit_at(depth);
            let next = if bit {
                self.nodes.get(cur).right
            } else {
                self.nodes.get(cur).left
            };
            if next == 0 {
                break;
            }
            cur = next;
            depth += 1;
            last_parent = cur;
            last_depth = depth;
        }
        (last_parent, last_depth)
    }

    fn matched_node(&self, bits: AF, len: u8) -> Option<u32> {
        let (last_parent, last_depth) = self.node_find(bits, len);
        if last_parent != 0 && last_depth == len {
            Some(last_parent)
        } else {
            None
        }
    }

    /// Walk bits of the query from root, remembering the deepest node with
    /// a non-zero `route_index` (§4.3 "LPM (`nodeLongestPrefixMatch`)").
    fn node_lpm(&self, query: AF) -> Option<(u32, u8)> {
        let mut cur = self.root;
        let mut depth: u8 = 0;
        let mut best = None;
        loop {
            if cur == 0 {
                break;
            }
            if self.nodes.get(cur).route_index != 0 {
                best = Some((cur, depth));
            }
            if depth == AF::BITS {
                break;
            }
            let bit = query.bit_at(depth);
            let next = if bit {
                self.nodes.get(cur).right
            } else {
                self.nodes.get(cur).left
            };
            if next == 0 {
                break;
            }
            cur = next;
            depth += 1;
        }
        best
    }

    pub fn insert(
        &mut self,
        key: PrefixKey<AF>,
        user_value: u64,
    ) -> Result<(), LpmError> {
        if self.route_count >= self.max_routes {
            return Err(LpmError::CapacityExceeded);
        }
        let len = key.len();
        let bits = key.bits();
        let existing = self.matched_node(bits, len);
        if let Some(node) = existing {
            if self.nodes.get(node).route_index != 0 {
                return Err(LpmError::AlreadyExists);
            }
        }

        let route_idx = self
            .routes
            .allocate_index()
            .ok_or(LpmError::CapacityExceeded)?;

        let final_node = match existing {
            Some(node) => node,
            None => match self.extend_trie(bits, len) {
                Ok(node) => node,
                Err(e) => {
                    // Roll back the route slot we just reserved; it was
                    // necessarily the most recently allocated one.
                    let _ = self.routes.free_last();
                    return Err(e);
                }
            },
        };

        *self.routes.get_mut(route_idx) = TrieRoute {
            parent_node: final_node,
            user_value,
            hit_count: AtomicU64::new(0),
        };
        self.nodes.get_mut(final_node).route_index = route_idx;
        self.route_count += 1;
        trace!("trie: inserted route at node {final_node} (len={len})");
        Ok(())
    }

    /// Extends the trie downward from the deepest existing node matching
    /// `bits`, creating a root if the trie was empty, and attaching
    /// directly to root when `len == 0` (§4.3 insert step 4).
    fn extend_trie(&mut self, bits: AF, len: u8) -> Result<u32, LpmError> {
        let (mut parent_idx, mut depth) = self.node_find(bits, len);
        if parent_idx == 0 {
            let root_idx = self
                .nodes
                .allocate_index()
                .ok_or(LpmError::CapacityExceeded)?;
            *self.nodes.get_mut(root_idx) = TrieNode {
                route_index: 0,
                left: 0,
                right: 0,
                parent: 0,
            };
            self.root = root_idx;
            parent_idx = root_idx;
            depth = 0;
        }
        for d in depth..len {
            let bit = bits.bit_at(d);
            let new_idx = self
                .nodes
                .allocate_index()
                .ok_or(LpmError::CapacityExceeded)?;
            *self.nodes.get_mut(new_idx) = TrieNode {
                route_index: 0,
                left: 0,
                right: 0,
                parent: parent_idx,
            };
            if bit {
                self.nodes.get_mut(parent_idx).right = new_idx;
            } else {
                self.nodes.get_mut(parent_idx).left = new_idx;
            }
            parent_idx = new_idx;
        }
        Ok(parent_idx)
    }

    pub fn delete(&mut self, key: PrefixKey<AF>) -> Result<(), LpmError> {
        let node = self
            .matched_node(key.bits(), key.len())
            .ok_or(LpmError::NotFound)?;
        let route_idx = self.nodes.get(node).route_index;
        if route_idx == 0 {
            return Err(LpmError::NotFound);
        }
        self.nodes.get_mut(node).route_index = 0;
        self.free_route_slot(route_idx);
        self.route_count -= 1;
        self.prune_from(node);
        trace!("trie: deleted route at node {node}");
        Ok(())
    }

    /// Frees `route_idx`, honoring the arena's "only the last slot may be
    /// freed" rule: if `route_idx` isn't last, the last route's fields are
    /// copied into it first and the owning node's `route_index` is
    /// rewritten to match (§4.3 delete step 2, §9).
    fn free_route_slot(&mut self, route_idx: u32) {
        let last = self
            .routes
            .last_used_index()
            .expect("route_count > 0 implies a last route exists");
        if route_idx != last {
            let (parent_node, user_value, hit) = self.routes.get(last).snapshot();
            *self.routes.get_mut(route_idx) = TrieRoute {
                parent_node,
                user_value,
                hit_count: AtomicU64::new(hit),
            };
            self.nodes.get_mut(parent_node).route_index = route_idx;
        }
        self.routes
            .free_last()
            .expect("route_idx was validated as in-range");
    }

    /// Walks from a now route-less node toward the root, pruning any node
    /// that has no route and no children, repairing every reference the
    /// arena's move-last-into-freed-slot discipline disturbs (§4.3 delete
    /// step 3, §9).
    fn prune_from(&mut self, start: u32) {
        let mut cur = start;
        loop {
            let n = *self.nodes.get(cur);
            if n.route_index != 0 || n.left != 0 || n.right != 0 {
                break;
            }
            let parent = n.parent;
            if parent == 0 {
                self.root = 0;
            } else {
                let p = self.nodes.get_mut(parent);
                if p.left == cur {
                    p.left = 0;
                } else if p.right == cur {
                    p.right = 0;
                }
            }

            let last_node_idx = self
                .nodes
                .last_used_index()
                .expect("cur is a live node, so at least one exists");
            let mut effective_parent = parent;
            if cur != last_node_idx {
                let moved = *self.nodes.get(last_node_idx);
                *self.nodes.get_mut(cur) = moved;
                if moved.route_index != 0 {
                    self.routes.get_mut(moved.route_index).parent_node = cur;
                }
                if moved.left != 0 {
                    self.nodes.get_mut(moved.left).parent = cur;
                }
                if moved.right != 0 {
                    self.nodes.get_mut(moved.right).parent = cur;
                }
                if moved.parent != 0 {
                    let p = self.nodes.get_mut(moved.parent);
                    if p.left == last_node_idx {
                        p.left = cur;
                    } else if p.right == last_node_idx {
                        p.right = cur;
                    }
                } else {
                    self.root = cur;
                }
                if effective_parent == last_node_idx {
                    effective_parent = cur;
                }
            }
            self.nodes
                .free_last()
                .expect("last_node_idx was just read as the last index");

            cur = effective_parent;
            if cur == 0 {
                break;
            }
        }
    }

    pub fn get(
        &self,
        key: PrefixKey<AF>,
        clear_hit_count: bool,
    ) -> Result<(u64, Option<u64>), LpmError> {
        let node = self
            .matched_node(key.bits(), key.len())
            .ok_or(LpmError::NotFound)?;
        let route_idx = self.nodes.get(node).route_index;
        if route_idx == 0 {
            return Err(LpmError::NotFound);
        }
        let route = self.routes.get(route_idx);
        let hit_count = self.hit_count_enabled.then(|| {
            if clear_hit_count {
                route.hit_count.swap(0, Ordering::Relaxed)
            } else {
                route.hit_count.load(Ordering::Relaxed)
            }
        });
        Ok((route.user_value, hit_count))
    }

    pub fn set(
        &mut self,
        key: PrefixKey<AF>,
        user_value: u64,
    ) -> Result<(), LpmError> {
        let node = self
            .matched_node(key.bits(), key.len())
            .ok_or(LpmError::NotFound)?;
        let route_idx = self.nodes.get(node).route_index;
        if route_idx == 0 {
            return Err(LpmError::NotFound);
        }
        self.routes.get_mut(route_idx).user_value = user_value;
        Ok(())
    }

    pub fn longest_prefix_match(
        &self,
        query: AF,
    ) -> Result<(u8, u64), LpmError> {
        let (node, depth) = self.node_lpm(query).ok_or(LpmError::NotFound)?;
        let route_idx = self.nodes.get(node).route_index;
        let route = self.routes.get(route_idx);
        if self.hit_count_enabled {
            route.hit_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok((depth, route.user_value))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::af::Ipv4Family;

    fn cfg() -> TableConfig {
        TableConfig::new().with_hit_count(true)
    }

    #[test]
    fn insert_get_delete_roundtrip() {
        let mut t: TrieBackend<Ipv4Family> = TrieBackend::new(16, &cfg());
        let key = PrefixKey::new(Ipv4Family(0x0A000000), 8); // 10.0.0.0/8
        assert!(t.insert(key, 42).is_ok());
        assert_eq!(t.get(key, false).unwrap(), (42, Some(0)));
        assert!(t.insert(key, 1).is_err());
        assert!(t.delete(key).is_ok());
        assert!(t.get(key, false).is_err());
        assert!(t.delete(key).is_err());
    }

    #[test]
    fn lpm_precedence() {
        let mut t: TrieBackend<Ipv4Family> = TrieBackend::new(16, &cfg());
        t.insert(PrefixKey::new(Ipv4Family(0x0A000000), 8), 1).unwrap();
        t.insert(PrefixKey::new(Ipv4Family(0x0A010000), 16), 2).unwrap();
        assert_eq!(
            t.longest_prefix_match(Ipv4Family(0x0A010203)).unwrap(),
            (16, 2)
        );
        assert_eq!(
            t.longest_prefix_match(Ipv4Family(0x0A020203)).unwrap(),
            (8, 1)
        );
        assert!(t.longest_prefix_match(Ipv4Family(0x0B000001)).is_err());
    }

    #[test]
    fn non_last_delete_reuses_slots_densely() {
        let mut t: TrieBackend<Ipv4Family> = TrieBackend::new(16, &cfg());
        let a = PrefixKey::new(Ipv4Family(0x01000000), 8);
        let b = PrefixKey::new(Ipv4Family(0x02000000), 8);
        let c = PrefixKey::new(Ipv4Family(0x03000000), 8);
        t.insert(a, 1).unwrap();
        t.insert(b, 2).unwrap();
        t.insert(c, 3).unwrap();
        t.delete(a).unwrap();
        assert_eq!(t.get(b, false).unwrap().0, 2);
        assert_eq!(t.get(c, false).unwrap().0, 3);
        assert_eq!(t.route_count(), 2);
    }
}
