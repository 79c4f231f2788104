//! A dual-backend (binary trie / open-chained hash) longest-prefix-match
//! routing table for IPv4 and IPv6 destination prefixes.
//!
//! A table is a [`RouteTable`], generic over [`AddressFamily`] so the
//! family is fixed at the type level ([`Ipv4Table`] / [`Ipv6Table`]).
//! Concurrent readers perform `longest_prefix_match` / `route_get` /
//! enumeration while a single writer mutates the table, guarded by one
//! [`parking_lot::RwLock`] per table (see [`rwlock::TableLock`]).
//!
//! ```no_run
//! use lpm_store::{Ipv4Table, TableConfig, Backend};
//!
//! let table = Ipv4Table::new(1_000, Backend::Trie, TableConfig::new().with_hit_count(true))
//!     .expect("valid construction options");
//! table.route_add(&[10, 0, 0, 0], 8, 42).unwrap();
//! assert_eq!(table.longest_prefix_match(&[10, 1, 2, 3]).unwrap(), (8, 42));
//! ```

mod arena;
mod enumeration;
mod hash;
mod rwlock;
mod table;
mod trie;
pub mod types;

pub use rwlock::TableLock;
pub use table::{Ipv4Table, Ipv6Table, RouteTable};
pub use types::{
    AddressFamily, Backend, Family, FatalError, FatalResult, Ipv4Family, Ipv6Family, LpmError,
    PrefixKey, TableConfig, TableInfo,
};
