//! Construction-time configuration for a [`crate::RouteTable`].
//!
//! Shaped after `rotonda-store`'s `rib::config::Config` family: a small,
//! `Clone + Default + Debug` options bag with builder-style `with_*`
//! setters, rather than a dozen constructor overloads.

/// Which internal data structure backs a table (§2 / §4.3 / §4.4).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    /// 1-bit binary trie over arena-indexed nodes.
    Trie,
    /// Single open-chained hash table keyed by `(masked_prefix, length)`.
    Hash,
}

/// Default flow-cache cell count when `ipv6_max_flows == 0`
/// (`IPV6_DEFAULT_FLOW_COUNT` in the original lpmht sources).
pub const IPV6_DEFAULT_FLOW_COUNT: usize = 2 * 1024 * 1024;

/// Default flow-cache age-sweep period in seconds when
/// `ipv6_flow_age_time == 0` (`IPV6_DEFAULT_FLOW_AGE_DISPATCH_TIME`).
pub const IPV6_DEFAULT_FLOW_AGE_DISPATCH_TIME: u64 = 30;

/// Target slots-per-route for the hash backend (`LPMHT_HASH_FACTOR`).
pub const HASH_FACTOR: usize = 5;

/// Hash table growth/shrink block size, in slots (`LPMHT_HASH_BLOCK_SIZE`
/// in the original sources is `20_000 * LPMHT_HASH_FACTOR`).
pub const HASH_BLOCK_SIZE: usize = 20_000 * HASH_FACTOR;

/// Maximum routes accepted by a trie-backed table (`LPMHT_MAX_TRIE_ROUTES`).
pub const MAX_TRIE_ROUTES: u32 = 2_000_000;

/// Maximum routes accepted by a hash-backed table (`LPMHT_MAX_HASH_ROUTES`).
pub const MAX_HASH_ROUTES: u32 = 10_000_000;

/// The recognized construction options of §6. Options not applicable to the
/// chosen backend/family combination are silently ignored.
#[derive(Clone, Debug)]
pub struct TableConfig {
    /// Enable atomic per-route hit counters.
    pub hit_count: bool,
    /// Allocate and maintain the ordered-enumeration sidecar.
    pub next_get: bool,
    /// Eagerly commit physical memory for all backend arenas and skip
    /// page-discard on free.
    pub mem_prealloc: bool,
    /// Hash backend only: allocate hash buckets for full capacity up
    /// front and never rehash.
    pub hash_prealloc: bool,
    /// IPv4 hash only: allocate the 2^24-entry rule table and launch the
    /// rebuilder thread.
    pub ipv4_rules: bool,
    /// IPv6 hash only: allocate the flow cache and launch the age sweeper.
    pub ipv6_flow: bool,
    /// Number of flow cells; 0 selects [`IPV6_DEFAULT_FLOW_COUNT`].
    pub ipv6_max_flows: usize,
    /// Flow age-sweep period in seconds; 0 selects
    /// [`IPV6_DEFAULT_FLOW_AGE_DISPATCH_TIME`].
    pub ipv6_flow_age_time: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            hit_count: false,
            next_get: false,
            mem_prealloc: false,
            hash_prealloc: false,
            ipv4_rules: false,
            ipv6_flow: false,
            ipv6_max_flows: 0,
            ipv6_flow_age_time: 0,
        }
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hit_count(mut self, enabled: bool) -> Self {
        self.hit_count = enabled;
        self
    }

    pub fn with_next_get(mut self, enabled: bool) -> Self {
        self.next_get = enabled;
        self
    }

    pub fn with_mem_prealloc(mut self, enabled: bool) -> Self {
        self.mem_prealloc = enabled;
        self
    }

    pub fn with_hash_prealloc(mut self, enabled: bool) -> Self {
        self.hash_prealloc = enabled;
        self
    }

    pub fn with_ipv4_rules(mut self, enabled: bool) -> Self {
        self.ipv4_rules = enabled;
        self
    }

    pub fn with_ipv6_flow(mut self, enabled: bool) -> Self {
        self.ipv6_flow = enabled;
        self
    }

    pub fn with_ipv6_max_flows(mut self, count: usize) -> Self {
        self.ipv6_max_flows = count;
        self
    }

    pub fn with_ipv6_flow_age_time(mut self, seconds: u64) -> Self {
        self.ipv6_flow_age_time = seconds;
        self
    }

    pub(crate) fn resolved_flow_count(&self) -> usize {
        if self.ipv6_max_flows == 0 {
            IPV6_DEFAULT_FLOW_COUNT
        } else {
            self.ipv6_max_flows
        }
    }

    pub(crate) fn resolved_flow_age_time(&self) -> u64 {
        if self.ipv6_flow_age_time == 0 {
            IPV6_DEFAULT_FLOW_AGE_DISPATCH_TIME
        } else {
            self.ipv6_flow_age_time
        }
    }
}
