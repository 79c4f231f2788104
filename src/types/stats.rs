//! Diagnostic/statistics types returned by `table_info()`.
//!
//! Field naming follows §6's `tableInfoGet`; the layout follows
//! `rotonda-store`'s `StrideStats`/`CreatedNodes` pattern of a small,
//! cheaply cloned, `Debug`+`Serialize` value type (`types/stats.rs`).

use serde_derive::Serialize;

/// Snapshot of a route table's size and internal bookkeeping, returned by
/// [`crate::RouteTable::table_info`].
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    /// Number of routes currently live in the table.
    pub num_routes: u32,
    /// Number of internal trie nodes currently allocated (trie backend
    /// only; always 0 for the hash backend).
    pub num_internal_nodes: u32,
    /// Bytes of physical memory currently committed across all arenas.
    pub mem_bytes_physical: u64,
    /// Bytes of virtual address space reserved across all arenas.
    pub mem_bytes_virtual: u64,
    /// Hash backend, `ipv4_rules` only: whether the 2^24-entry rule table
    /// currently reflects every route of length <= 24.
    pub ipv4_rule_table_ready: Option<bool>,
    /// Hash backend, `ipv6_flow` only: number of LPM lookups that were not
    /// served from the flow cache (`Skip` or `Miss`, per §9's preserved
    /// original behavior of counting both the same way).
    pub ipv6_flow_miss_count: Option<u64>,
}
