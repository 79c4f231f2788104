//! The open-chained hash-per-prefix-length backend (§4.4).
//!
//! One arena of [`HashRoute`]s, one flat vector of bucket heads keyed by
//! `fnv1a_prefix_hash(masked_prefix_bytes, prefix_length) % buckets.len()`,
//! and a strictly-descending `active_prefix_list` that drives LPM without
//! needing to know which lengths are in use ahead of time. Optionally
//! paired with the IPv4 [`rule_table`] accelerator or the IPv6
//! [`flow_cache`], exactly one of which a given instantiation can use
//! since they're gated on `AF::BITS`.
//!
//! Like [`crate::trie::TrieBackend`], this backend takes no lock itself;
//! the façade holds a [`crate::rwlock::TableLock`] around every call.

pub mod flow_cache;
pub mod route;
pub mod rule_table;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::arena::Arena;
use crate::types::af::AddressFamily;
use crate::types::config::{TableConfig, HASH_BLOCK_SIZE, HASH_FACTOR};
use crate::types::errors::LpmError;
use crate::types::prefix::PrefixKey;

pub use flow_cache::FlowCache;
pub use route::HashRoute;
pub use rule_table::{RuleTableHost, RuleTableStorage, RULE_TABLE_BITS};

use crate::hash::mask::fnv1a_prefix_hash;

mod mask;

/// The open-chained hash LPM backend for one address family.
pub struct HashBackend<AF: AddressFamily> {
    routes: Arena<HashRoute<AF>>,
    hash_table: Vec<u32>,
    current_blocks: usize,
    /// Number of live routes at each prefix length, index `0..=max_len`.
    num_routes_in_prefix: Vec<u32>,
    /// Lengths with at least one live route, kept strictly descending.
    active_prefix_list: Vec<u8>,
    route_count: u32,
    max_routes: u32,
    max_len: u8,
    hit_count_enabled: bool,
    hash_prealloc: bool,
    /// Bumped on every successful insert/delete; used by the IPv6 flow
    /// cache to recognize stale entries (§4.6). Harmless and unused for v4.
    epoch: AtomicU32,
    rule_table: Option<RuleTableStorage>,
    flow_cache: Option<Arc<FlowCache>>,
    flow_miss_count: AtomicU64,
}

impl<AF: AddressFamily> HashBackend<AF> {
    pub fn new(max_routes: u32, config: &TableConfig) -> Self {
        let max_len = AF::BITS;
        let initial_blocks = if config.hash_prealloc {
            needed_blocks(max_routes).max(1)
        } else {
            1
        };
        let rule_table = if AF::BITS == 32 && config.ipv4_rules {
            Some(RuleTableStorage::new())
        } else {
            None
        };
        let flow_cache = if AF::BITS == 128 && config.ipv6_flow {
            Some(Arc::new(FlowCache::new(config.resolved_flow_count())))
        } else {
            None
        };
        debug!(
            "hash: init max_routes={max_routes} initial_blocks={initial_blocks} \
             hash_prealloc={} ipv4_rules={} ipv6_flow={}",
            config.hash_prealloc,
            rule_table.is_some(),
            flow_cache.is_some()
        );
        Self {
            routes: Arena::new(max_routes + 1, config.mem_prealloc),
            hash_table: vec![0u32; initial_blocks * HASH_BLOCK_SIZE],
            current_blocks: initial_blocks,
            num_routes_in_prefix: vec![0u32; max_len as usize + 1],
            active_prefix_list: Vec::new(),
            route_count: 0,
            max_routes,
            max_len,
            hit_count_enabled: config.hit_count,
            hash_prealloc: config.hash_prealloc,
            epoch: AtomicU32::new(0),
            rule_table,
            flow_cache,
            flow_miss_count: AtomicU64::new(0),
        }
    }

    pub fn route_count(&self) -> u32 {
        self.route_count
    }

    /// Always 0: the hash backend has no internal/interior nodes distinct
    /// from routes themselves (§6 `table_info`).
    pub fn num_internal_nodes(&self) -> u32 {
        0
    }

    pub fn mem_bytes_physical(&self) -> u64 {
        self.routes.physical_bytes() + self.bucket_table_bytes() + self.accelerator_bytes()
    }

    pub fn mem_bytes_virtual(&self) -> u64 {
        self.routes.virtual_bytes() + self.bucket_table_bytes() + self.accelerator_bytes()
    }

    fn bucket_table_bytes(&self) -> u64 {
        (self.hash_table.len() * std::mem::size_of::<u32>()) as u64
    }

    fn accelerator_bytes(&self) -> u64 {
        let rule_bytes = if self.rule_table.is_some() {
            (rule_table::RULE_TABLE_SIZE * std::mem::size_of::<u32>()) as u64
        } else {
            0
        };
        let flow_bytes = self
            .flow_cache
            .as_ref()
            .map(|c| c.byte_size() as u64)
            .unwrap_or(0);
        rule_bytes + flow_bytes
    }

    pub fn rule_table_ready(&self) -> Option<bool> {
        self.rule_table.as_ref().map(|rt| rt.is_ready())
    }

    pub fn flow_miss_count(&self) -> Option<u64> {
        self.flow_cache
            .as_ref()
            .map(|_| self.flow_miss_count.load(Ordering::Relaxed))
    }

    pub(crate) fn flow_cache(&self) -> Option<Arc<FlowCache>> {
        self.flow_cache.clone()
    }

    pub(crate) fn current_epoch(&self) -> u32 {
        self.epoch.load(Ordering::Relaxed)
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::Relaxed);
    }

    fn bucket_index(&self, masked: AF, len: u8) -> usize {
        let bytes = masked.to_be_bytes();
        let h = fnv1a_prefix_hash(&bytes, len);
        (h as usize) % self.hash_table.len()
    }

    fn find_route(&self, masked: AF, len: u8) -> Option<u32> {
        let bucket = self.bucket_index(masked, len);
        let mut cur = self.hash_table[bucket];
        while cur != 0 {
            let r = self.routes.get(cur);
            if r.prefix_length == len && r.prefix == masked {
                return Some(cur);
            }
            cur = r.next;
        }
        None
    }

    fn link_into_bucket(&mut self, idx: u32) {
        let (prefix, prefix_length) = {
            let r = self.routes.get(idx);
            (r.prefix, r.prefix_length)
        };
        let bucket = self.bucket_index(prefix, prefix_length);
        let old_head = self.hash_table[bucket];
        {
            let route = self.routes.get_mut(idx);
            route.prev = 0;
            route.next = old_head;
        }
        if old_head != 0 {
            self.routes.get_mut(old_head).prev = idx;
        }
        self.hash_table[bucket] = idx;
    }

    fn unlink_from_bucket(&mut self, idx: u32) {
        let (prev, next, bucket) = {
            let r = self.routes.get(idx);
            (r.prev, r.next, self.bucket_index(r.prefix, r.prefix_length))
        };
        if prev != 0 {
            self.routes.get_mut(prev).next = next;
        } else {
            self.hash_table[bucket] = next;
        }
        if next != 0 {
            self.routes.get_mut(next).prev = prev;
        }
    }

    fn insert_active_length(&mut self, len: u8) {
        let pos = self.active_prefix_list.iter().position(|&l| l <= len);
        match pos {
            Some(i) => self.active_prefix_list.insert(i, len),
            None => self.active_prefix_list.push(len),
        }
    }

    fn remove_active_length(&mut self, len: u8) {
        if let Some(i) = self.active_prefix_list.iter().position(|&l| l == len) {
            self.active_prefix_list.remove(i);
        }
    }

    fn maybe_grow(&mut self, route_count: u32) {
        if self.hash_prealloc {
            return;
        }
        let needed = needed_blocks(route_count).max(1);
        if needed > self.current_blocks {
            self.rehash_to(needed);
        }
    }

    /// Shrinks with a 2-block hysteresis margin so that a delete/insert
    /// pair straddling a block boundary doesn't thrash (§4.4 "Grow +
    /// rehash if necessary", supplemented per the original `lpmht` sources'
    /// shrink behavior; see `SPEC_FULL.md` scenario S8).
    fn maybe_shrink(&mut self, route_count: u32) {
        if self.hash_prealloc {
            return;
        }
        let needed_raw = needed_blocks(route_count);
        let needed = needed_raw.max(1);
        if needed_raw == 0 || self.current_blocks.saturating_sub(needed) >= 2 {
            self.rehash_to(needed);
        }
    }

    fn rehash_to(&mut self, new_blocks: usize) {
        trace!(
            "hash: rehash {} -> {} blocks ({} routes)",
            self.current_blocks,
            new_blocks,
            self.route_count
        );
        self.hash_table = vec![0u32; new_blocks * HASH_BLOCK_SIZE];
        self.current_blocks = new_blocks;
        if let Ok(last) = self.routes.last_used_index() {
            for idx in 1..=last {
                self.link_into_bucket(idx);
            }
        }
    }

    pub fn insert(&mut self, key: PrefixKey<AF>, user_value: u64) -> Result<(), LpmError> {
        if self.route_count >= self.max_routes {
            return Err(LpmError::CapacityExceeded);
        }
        let len = key.len();
        let masked = key.bits();
        if self.find_route(masked, len).is_some() {
            return Err(LpmError::AlreadyExists);
        }

        self.maybe_grow(self.route_count + 1);

        let idx = self
            .routes
            .allocate_index()
            .ok_or(LpmError::CapacityExceeded)?;
        *self.routes.get_mut(idx) = HashRoute {
            prefix: masked,
            prefix_length: len,
            user_value,
            hit_count: AtomicU64::new(0),
            prev: 0,
            next: 0,
        };
        self.link_into_bucket(idx);
        self.route_count += 1;

        self.num_routes_in_prefix[len as usize] += 1;
        if self.num_routes_in_prefix[len as usize] == 1 {
            self.insert_active_length(len);
        }

        self.bump_epoch();
        self.mark_rule_table_stale_if_relevant(len);
        trace!("hash: inserted (len={len})");
        Ok(())
    }

    pub fn delete(&mut self, key: PrefixKey<AF>) -> Result<(), LpmError> {
        let len = key.len();
        let masked = key.bits();
        let idx = self.find_route(masked, len).ok_or(LpmError::NotFound)?;
        self.unlink_from_bucket(idx);

        let last = self
            .routes
            .last_used_index()
            .expect("route_count > 0 implies a last route exists");
        if idx != last {
            let (m_prefix, m_len, m_user, m_hit, m_prev, m_next) =
                self.routes.get(last).snapshot();
            *self.routes.get_mut(idx) = HashRoute {
                prefix: m_prefix,
                prefix_length: m_len,
                user_value: m_user,
                hit_count: AtomicU64::new(m_hit),
                prev: m_prev,
                next: m_next,
            };
            if m_prev != 0 {
                self.routes.get_mut(m_prev).next = idx;
            } else {
                let bucket = self.bucket_index(m_prefix, m_len);
                self.hash_table[bucket] = idx;
            }
            if m_next != 0 {
                self.routes.get_mut(m_next).prev = idx;
            }
        }
        self.routes
            .free_last()
            .expect("idx was validated as in-range");

        self.route_count -= 1;
        self.num_routes_in_prefix[len as usize] -= 1;
        if self.num_routes_in_prefix[len as usize] == 0 {
            self.remove_active_length(len);
        }

        self.bump_epoch();
        self.mark_rule_table_stale_if_relevant(len);
        self.maybe_shrink(self.route_count);
        trace!("hash: deleted (len={len})");
        Ok(())
    }

    fn mark_rule_table_stale_if_relevant(&self, len: u8) {
        if let Some(rt) = &self.rule_table {
            if len <= RULE_TABLE_BITS as u8 {
                rt.mark_stale();
            }
        }
    }

    pub fn get(
        &self,
        key: PrefixKey<AF>,
        clear_hit_count: bool,
    ) -> Result<(u64, Option<u64>), LpmError> {
        let idx = self
            .find_route(key.bits(), key.len())
            .ok_or(LpmError::NotFound)?;
        let route = self.routes.get(idx);
        let hit_count = self.hit_count_enabled.then(|| {
            if clear_hit_count {
                route.hit_count.swap(0, Ordering::Relaxed)
            } else {
                route.hit_count.load(Ordering::Relaxed)
            }
        });
        Ok((route.user_value, hit_count))
    }

    pub fn set(&mut self, key: PrefixKey<AF>, user_value: u64) -> Result<(), LpmError> {
        let idx = self
            .find_route(key.bits(), key.len())
            .ok_or(LpmError::NotFound)?;
        self.routes.get_mut(idx).user_value = user_value;
        Ok(())
    }

    fn record_hit(&self, idx: u32) -> (u8, u64) {
        let route = self.routes.get(idx);
        if self.hit_count_enabled {
            route.hit_count.fetch_add(1, Ordering::Relaxed);
        }
        (route.prefix_length, route.user_value)
    }

    /// Standard / IPv4-rule-accelerated LPM (§4.4 both variants, unified):
    /// for v6 (`rule_table` always `None`) this is exactly the standard
    /// descending-length probe; for v4 with the rule table ready, the
    /// first length <= 24 encountered in the descending walk is resolved
    /// with a single O(1) probe instead of continuing per-length.
    ///
    /// Does not consult the IPv6 flow cache; callers on the v6 path probe
    /// [`Self::flow_cache`] themselves first (§4.6), since the cache also
    /// needs to *learn* on miss, which this method has no reason to do on
    /// every call.
    pub fn longest_prefix_match(&self, query: AF) -> Result<(u8, u64), LpmError> {
        let mut consulted_rule_table = false;
        for &len in &self.active_prefix_list {
            if len <= RULE_TABLE_BITS as u8 && !consulted_rule_table {
                consulted_rule_table = true;
                if let Some(rt) = &self.rule_table {
                    if rt.is_ready() {
                        return match rt.lookup(query.top_24()) {
                            Some(idx) => Ok(self.record_hit(idx)),
                            None => Err(LpmError::NotFound),
                        };
                    }
                }
            }
            let masked = query.masked(len);
            if let Some(idx) = self.find_route(masked, len) {
                return Ok(self.record_hit(idx));
            }
        }
        Err(LpmError::NotFound)
    }

    /// IPv6-only LPM entry point that consults the flow cache before
    /// falling back to [`Self::longest_prefix_match`], learning the result
    /// on a genuine miss (§4.6 "Match" / "Learn").
    pub fn longest_prefix_match_with_flow_cache(
        &self,
        query: AF,
    ) -> Result<(u8, u64), LpmError> {
        let Some(cache) = &self.flow_cache else {
            return self.longest_prefix_match(query);
        };
        let epoch = self.current_epoch();
        if let flow_cache::FlowLookup::Hit { route_index } = cache.lookup(query.as_u128(), epoch)
        {
            return Ok(self.record_hit(route_index));
        }
        self.flow_miss_count.fetch_add(1, Ordering::Relaxed);
        let result = self.longest_prefix_match(query);
        if let Ok((len, _)) = result {
            if let Some(idx) = self.find_route(query.masked(len), len) {
                cache.learn(query.as_u128(), idx, epoch);
            }
        }
        result
    }

    /// Used only by the rule-builder thread: an LPM restricted to lengths
    /// <= 24 that never consults the rule table itself (§4.5).
    fn probe_length_24_lpm(&self, key24: u32) -> Option<u32> {
        debug_assert_eq!(AF::BYTES, 4, "the rule table is IPv4-only");
        let top24_bytes = (key24 << 8).to_be_bytes();
        for &len in &self.active_prefix_list {
            if len > RULE_TABLE_BITS as u8 {
                continue;
            }
            let masked = AF::from_be_bytes(&top24_bytes).masked(len);
            if let Some(idx) = self.find_route(masked, len) {
                return Some(idx);
            }
        }
        None
    }

}

impl<AF: AddressFamily> RuleTableHost for HashBackend<AF> {
    fn rule_table(&self) -> &RuleTableStorage {
        self.rule_table
            .as_ref()
            .expect("rule builder only spawned when rule_table is Some")
    }

    fn probe_length_24_lpm(&self, key24: u32) -> Option<u32> {
        HashBackend::probe_length_24_lpm(self, key24)
    }
}

fn needed_blocks(route_count: u32) -> usize {
    (route_count as usize * HASH_FACTOR).div_ceil(HASH_BLOCK_SIZE)
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
        let mut h: HashBackend<Ipv4Family> = HashBackend::new(16, &cfg());
        let key = PrefixKey::new(Ipv4Family(0x0A000000), 8);
        assert!(h.insert(key, 42).is_ok());
        assert_eq!(h.get(key, false).unwrap(), (42, Some(0)));
        assert!(h.insert(key, 1).is_err());
        assert!(h.delete(key).is_ok());
        assert!(h.get(key, false).is_err());
        assert!(h.delete(key).is_err());
    }

    #[test]
    fn lpm_precedence() {
        let mut h: HashBackend<Ipv4Family> = HashBackend::new(16, &cfg());
        h.insert(PrefixKey::new(Ipv4Family(0x0A000000), 8), 1).unwrap();
        h.insert(PrefixKey::new(Ipv4Family(0x0A010000), 16), 2).unwrap();
        assert_eq!(h.longest_prefix_match(Ipv4Family(0x0A010203)).unwrap(), (16, 2));
        assert_eq!(h.longest_prefix_match(Ipv4Family(0x0A020203)).unwrap(), (8, 1));
        assert!(h.longest_prefix_match(Ipv4Family(0x0B000001)).is_err());
    }

    #[test]
    fn non_last_delete_reuses_slots_densely() {
        let mut h: HashBackend<Ipv4Family> = HashBackend::new(16, &cfg());
        let a = PrefixKey::new(Ipv4Family(0x01000000), 8);
        let b = PrefixKey::new(Ipv4Family(0x02000000), 8);
        let c = PrefixKey::new(Ipv4Family(0x03000000), 8);
        h.insert(a, 1).unwrap();
        h.insert(b, 2).unwrap();
        h.insert(c, 3).unwrap();
        h.delete(a).unwrap();
        assert_eq!(h.get(b, false).unwrap().0, 2);
        assert_eq!(h.get(c, false).unwrap().0, 3);
        assert_eq!(h.route_count(), 2);
    }

    #[test]
    fn grow_then_shrink_hysteresis() {
        let mut h: HashBackend<Ipv4Family> = HashBackend::new(200_000, &cfg());
        let mut keys = Vec::new();
        for i in 0..150_000u32 {
            let key = PrefixKey::new(Ipv4Family(i << 8), 24);
            h.insert(key, i as u64).unwrap();
            keys.push(key);
        }
        let grown_blocks = h.current_blocks;
        assert!(grown_blocks > 1);
        for key in keys.iter().take(140_000) {
            h.delete(*key).unwrap();
        }
        assert!(h.current_blocks < grown_blocks);
        for key in keys.iter().skip(140_000) {
            assert!(h.get(*key, false).is_ok());
        }
    }
}
