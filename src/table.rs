//! The façade: dispatches by backend, keeps the enumeration sidecar in
//! sync with every mutation, and owns the optional accelerator threads
//! (§4.2 "Façade", §4.5, §4.6).
//!
//! Mirrors the shape of `rotonda-store`'s top-level `rib` type: a thin struct
//! holding one lock-guarded inner state plus whatever background workers
//! the configuration asked for, with construction validating options and
//! silently ignoring the ones that don't apply to this family/backend
//! combination (§6 "Construction inputs").

use std::net::IpAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use inetnum::addr::Prefix;
use log::info;

use crate::enumeration::EnumerationTree;
use crate::hash::rule_table::{spawn_rule_builder, RuleBuilderHandle, RuleTableHost, RuleTableStorage};
use crate::hash::flow_cache::spawn_flow_sweeper;
use crate::hash::flow_cache::FlowSweeperHandle;
use crate::hash::HashBackend;
use crate::rwlock::TableLock;
use crate::trie::TrieBackend;
use crate::types::af::{AddressFamily, Ipv4Family, Ipv6Family};
use crate::types::config::{Backend, TableConfig, MAX_HASH_ROUTES, MAX_TRIE_ROUTES};
use crate::types::errors::LpmError;
use crate::types::prefix::PrefixKey;
use crate::types::stats::TableInfo;

/// Either backend, generic over the address family (§2).
enum BackendImpl<AF: AddressFamily> {
    Trie(TrieBackend<AF>),
    Hash(HashBackend<AF>),
}

impl<AF: AddressFamily> BackendImpl<AF> {
    fn insert(&mut self, key: PrefixKey<AF>, user_value: u64) -> Result<(), LpmError> {
        match self {
            BackendImpl::Trie(t) => t.insert(key, user_value),
            BackendImpl::Hash(h) => h.insert(key, user_value),
        }
    }

    fn delete(&mut self, key: PrefixKey<AF>) -> Result<(), LpmError> {
        match self {
            BackendImpl::Trie(t) => t.delete(key),
            BackendImpl::Hash(h) => h.delete(key),
        }
    }

    fn set(&mut self, key: PrefixKey<AF>, user_value: u64) -> Result<(), LpmError> {
        match self {
            BackendImpl::Trie(t) => t.set(key, user_value),
            BackendImpl::Hash(h) => h.set(key, user_value),
        }
    }

    fn get(
        &self,
        key: PrefixKey<AF>,
        clear_hit_count: bool,
    ) -> Result<(u64, Option<u64>), LpmError> {
        match self {
            BackendImpl::Trie(t) => t.get(key, clear_hit_count),
            BackendImpl::Hash(h) => h.get(key, clear_hit_count),
        }
    }

    fn longest_prefix_match(&self, query: AF) -> Result<(u8, u64), LpmError> {
        match self {
            BackendImpl::Trie(t) => t.longest_prefix_match(query),
            BackendImpl::Hash(h) => h.longest_prefix_match_with_flow_cache(query),
        }
    }

    fn route_count(&self) -> u32 {
        match self {
            BackendImpl::Trie(t) => t.route_count(),
            BackendImpl::Hash(h) => h.route_count(),
        }
    }

    fn num_internal_nodes(&self) -> u32 {
        match self {
            BackendImpl::Trie(t) => t.num_internal_nodes(),
            BackendImpl::Hash(h) => h.num_internal_nodes(),
        }
    }

    fn mem_bytes_physical(&self) -> u64 {
        match self {
            BackendImpl::Trie(t) => t.mem_bytes_physical(),
            BackendImpl::Hash(h) => h.mem_bytes_physical(),
        }
    }

    fn mem_bytes_virtual(&self) -> u64 {
        match self {
            BackendImpl::Trie(t) => t.mem_bytes_virtual(),
            BackendImpl::Hash(h) => h.mem_bytes_virtual(),
        }
    }

    fn rule_table_ready(&self) -> Option<bool> {
        match self {
            BackendImpl::Trie(_) => None,
            BackendImpl::Hash(h) => h.rule_table_ready(),
        }
    }

    fn flow_miss_count(&self) -> Option<u64> {
        match self {
            BackendImpl::Trie(_) => None,
            BackendImpl::Hash(h) => h.flow_miss_count(),
        }
    }

    fn as_hash(&self) -> Option<&HashBackend<AF>> {
        match self {
            BackendImpl::Trie(_) => None,
            BackendImpl::Hash(h) => Some(h),
        }
    }
}

/// Everything guarded by one [`TableLock`]: the backend plus, if enabled,
/// the enumeration sidecar, kept in exact sync on every write (§4.7).
struct TableState<AF: AddressFamily> {
    backend: BackendImpl<AF>,
    enumeration: Option<EnumerationTree<AF>>,
}

impl<AF: AddressFamily> RuleTableHost for TableState<AF> {
    fn rule_table(&self) -> &RuleTableStorage {
        self.backend
            .as_hash()
            .expect("rule builder only spawned for a hash backend")
            .rule_table()
    }

    fn probe_length_24_lpm(&self, key24: u32) -> Option<u32> {
        self.backend
            .as_hash()
            .expect("rule builder only spawned for a hash backend")
            .probe_length_24_lpm(key24)
    }
}

/// A single LPM route table for one address family (§3 "Route table
/// instance"). Construct with [`RouteTable::new`], or use the
/// [`crate::Ipv4Table`] / [`crate::Ipv6Table`] aliases.
///
/// The address family is chosen at the type level rather than through a
/// runtime `ip_family` selector: `RouteTable<Ipv4Family>` and
/// `RouteTable<Ipv6Family>` are distinct types, so a caller cannot build a
/// table for one family and query it with the other's byte width — a
/// class of the construction-time `InvalidArgument` the original C API
/// has to check for is simply unrepresentable here (see `DESIGN.md`).
pub struct RouteTable<AF: AddressFamily> {
    state: Arc<TableLock<TableState<AF>>>,
    rule_builder: Option<RuleBuilderHandle>,
    flow_sweeper: Option<FlowSweeperHandle>,
    backend_kind: Backend,
    max_routes: u32,
}

impl<AF: AddressFamily> RouteTable<AF> {
    /// Creates a new table. `max_routes` must be nonzero and within the
    /// chosen backend's limit (`MAX_TRIE_ROUTES` / `MAX_HASH_ROUTES`).
    /// Options in `config` that don't apply to this backend/family
    /// combination are silently ignored (§6).
    pub fn new(
        max_routes: u32,
        backend: Backend,
        config: TableConfig,
    ) -> Result<Self, LpmError> {
        if max_routes == 0 {
            return Err(LpmError::InvalidArgument);
        }
        match backend {
            Backend::Trie if max_routes > MAX_TRIE_ROUTES => {
                return Err(LpmError::InvalidArgument)
            }
            Backend::Hash if max_routes > MAX_HASH_ROUTES => {
                return Err(LpmError::InvalidArgument)
            }
            _ => {}
        }

        let backend_impl = match backend {
            Backend::Trie => BackendImpl::Trie(TrieBackend::new(max_routes, &config)),
            Backend::Hash => BackendImpl::Hash(HashBackend::new(max_routes, &config)),
        };
        let enumeration = config.next_get.then(EnumerationTree::new);
        let state = Arc::new(TableLock::new(TableState {
            backend: backend_impl,
            enumeration,
        }));

        let mut rule_builder = None;
        let mut flow_sweeper = None;

        if AF::BITS == 32 && backend == Backend::Hash && config.ipv4_rules {
            let stop = Arc::new(AtomicBool::new(false));
            rule_builder = Some(spawn_rule_builder(state.clone(), stop));
            info!("ipv4 rule builder thread launched");
        }

        if AF::BITS == 128 && backend == Backend::Hash && config.ipv6_flow {
            let cache = state.read().backend.as_hash().and_then(|h| h.flow_cache());
            if let Some(cache) = cache {
                let stop = Arc::new(AtomicBool::new(false));
                let age_period =
                    std::time::Duration::from_secs(config.resolved_flow_age_time());
                flow_sweeper = Some(spawn_flow_sweeper(cache, age_period, stop));
                info!("ipv6 flow sweeper thread launched");
            }
        }

        Ok(Self {
            state,
            rule_builder,
            flow_sweeper,
            backend_kind: backend,
            max_routes,
        })
    }

    /// The address family this table was created for (§3 "Route table
    /// instance").
    pub fn family(&self) -> crate::types::af::Family {
        AF::FAMILY
    }

    /// Which backend this table was created with.
    pub fn backend(&self) -> Backend {
        self.backend_kind
    }

    /// The `max_routes` bound this table was created with.
    pub fn max_routes(&self) -> u32 {
        self.max_routes
    }

    fn parse_key(prefix: &[u8], length: u8) -> Result<PrefixKey<AF>, LpmError> {
        if prefix.len() != AF::BYTES || length > AF::BITS {
            return Err(LpmError::InvalidArgument);
        }
        Ok(PrefixKey::new(AF::from_be_bytes(prefix), length))
    }

    pub fn route_add(&self, prefix: &[u8], length: u8, user_value: u64) -> Result<(), LpmError> {
        let key = Self::parse_key(prefix, length)?;
        let mut state = self.state.write();
        state.backend.insert(key, user_value)?;
        if let Some(tree) = &mut state.enumeration {
            tree.insert(key);
        }
        Ok(())
    }

    pub fn route_delete(&self, prefix: &[u8], length: u8) -> Result<(), LpmError> {
        let key = Self::parse_key(prefix, length)?;
        let mut state = self.state.write();
        state.backend.delete(key)?;
        if let Some(tree) = &mut state.enumeration {
            tree.remove(key);
        }
        Ok(())
    }

    pub fn route_set(&self, prefix: &[u8], length: u8, user_value: u64) -> Result<(), LpmError> {
        let key = Self::parse_key(prefix, length)?;
        self.state.write().backend.set(key, user_value)
    }

    pub fn route_get(
        &self,
        prefix: &[u8],
        length: u8,
        clear_hit_count: bool,
    ) -> Result<(u64, Option<u64>), LpmError> {
        let key = Self::parse_key(prefix, length)?;
        self.state.read().backend.get(key, clear_hit_count)
    }

    pub fn longest_prefix_match(&self, query_prefix: &[u8]) -> Result<(u8, u64), LpmError> {
        if query_prefix.len() != AF::BYTES {
            return Err(LpmError::InvalidArgument);
        }
        let query = AF::from_be_bytes(query_prefix);
        self.state.read().backend.longest_prefix_match(query)
    }

    pub fn route_first_get(
        &self,
        clear_hit_count: bool,
    ) -> Result<(Vec<u8>, u8, u64, Option<u64>), LpmError> {
        let state = self.state.read();
        let tree = state.enumeration.as_ref().ok_or(LpmError::Unsupported)?;
        let key = tree.first().ok_or(LpmError::Empty)?;
        let (user_value, hit_count) = state.backend.get(key, clear_hit_count)?;
        Ok((key.bits().to_be_bytes(), key.len(), user_value, hit_count))
    }

    pub fn route_next_get(
        &self,
        previous_prefix: &[u8],
        previous_length: u8,
        clear_hit_count: bool,
    ) -> Result<(Vec<u8>, u8, u64, Option<u64>), LpmError> {
        let previous = Self::parse_key(previous_prefix, previous_length)?;
        let state = self.state.read();
        let tree = state.enumeration.as_ref().ok_or(LpmError::Unsupported)?;
        let key = tree.next_after(previous).ok_or(LpmError::NotFound)?;
        let (user_value, hit_count) = state.backend.get(key, clear_hit_count)?;
        Ok((key.bits().to_be_bytes(), key.len(), user_value, hit_count))
    }

    pub fn table_info(&self) -> TableInfo {
        let state = self.state.read();
        TableInfo {
            num_routes: state.backend.route_count(),
            num_internal_nodes: state.backend.num_internal_nodes(),
            mem_bytes_physical: state.backend.mem_bytes_physical(),
            mem_bytes_virtual: state.backend.mem_bytes_virtual(),
            ipv4_rule_table_ready: state.backend.rule_table_ready(),
            ipv6_flow_miss_count: state.backend.flow_miss_count(),
        }
    }

    /// Convenience wrapper over [`Self::route_add`] for callers already
    /// working with `inetnum`'s `Prefix`, the prefix type used throughout
    /// `rotonda-store`'s `rib`, rather than raw wire bytes.
    pub fn route_add_prefix(&self, prefix: Prefix, user_value: u64) -> Result<(), LpmError> {
        self.route_add(&ip_addr_to_bytes(prefix.addr()), prefix.len(), user_value)
    }

    pub fn route_delete_prefix(&self, prefix: Prefix) -> Result<(), LpmError> {
        self.route_delete(&ip_addr_to_bytes(prefix.addr()), prefix.len())
    }

    pub fn route_get_prefix(
        &self,
        prefix: Prefix,
        clear_hit_count: bool,
    ) -> Result<(u64, Option<u64>), LpmError> {
        self.route_get(&ip_addr_to_bytes(prefix.addr()), prefix.len(), clear_hit_count)
    }

    /// Convenience wrapper over [`Self::longest_prefix_match`] taking a
    /// full `std::net::IpAddr` destination instead of raw wire bytes.
    pub fn longest_prefix_match_addr(&self, addr: IpAddr) -> Result<(u8, u64), LpmError> {
        self.longest_prefix_match(&ip_addr_to_bytes(addr))
    }
}

fn ip_addr_to_bytes(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

impl<AF: AddressFamily> Drop for RouteTable<AF> {
    /// Stops and joins background threads before the backend and
    /// enumeration sidecar are dropped, in the order §4.2/§4.5 specify:
    /// rule builder first, then flow sweeper.
    fn drop(&mut self) {
        if let Some(handle) = self.rule_builder.take() {
            handle.stop_and_join();
        }
        if let Some(handle) = self.flow_sweeper.take() {
            handle.stop_and_join();
        }
    }
}

/// An IPv4 route table.
pub type Ipv4Table = RouteTable<Ipv4Family>;
/// An IPv6 route table.
pub type Ipv6Table = RouteTable<Ipv6Family>;
