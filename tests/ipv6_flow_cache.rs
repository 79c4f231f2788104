//! S6 — the IPv6 flow cache must never cause a stale result: lookups
//! interleaved with route churn always reflect the live route set, even
//! though the cache itself is best-effort and epoch-tagged.

use std::net::Ipv6Addr;

use lpm_store::{Backend, Ipv6Table, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

fn v6(segments: [u16; 8]) -> [u8; 16] {
    Ipv6Addr::from(segments).octets()
}

#[test]
fn flow_cache_never_returns_a_route_that_no_longer_exists() {
    common::init();
    let table = Ipv6Table::new(
        8,
        Backend::Hash,
        TableConfig::new().with_ipv6_flow(true).with_ipv6_max_flows(16),
    )
    .unwrap();

    let dest = v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]);
    table
        .route_add(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0]), 64, 1)
        .unwrap();

    // Warm the cache for this destination.
    assert_eq!(table.longest_prefix_match(&dest).unwrap(), (64, 1));
    assert_eq!(table.longest_prefix_match(&dest).unwrap(), (64, 1));

    // A more specific route changes what this destination should resolve
    // to; a cached result from before must not be served after this.
    table
        .route_add(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]), 128, 2)
        .unwrap();
    assert_eq!(table.longest_prefix_match(&dest).unwrap(), (128, 2));

    // Removing the /64 entirely must not resurrect it from the cache.
    table
        .route_delete(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0]), 64)
        .unwrap();
    assert_eq!(table.longest_prefix_match(&dest).unwrap(), (128, 2));

    table
        .route_delete(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 1]), 128)
        .unwrap();
    assert!(table.longest_prefix_match(&dest).is_err());
}

#[test]
fn flow_cache_is_opt_in_and_miss_count_starts_at_zero() {
    common::init();
    let table = Ipv6Table::new(4, Backend::Hash, TableConfig::new()).unwrap();
    table
        .route_add(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0]), 64, 1)
        .unwrap();
    assert_eq!(table.table_info().ipv6_flow_miss_count, None);

    let table = Ipv6Table::new(4, Backend::Hash, TableConfig::new().with_ipv6_flow(true)).unwrap();
    table
        .route_add(&v6([0x2001, 0xdb8, 0, 0, 0, 0, 0, 0]), 64, 1)
        .unwrap();
    assert_eq!(table.table_info().ipv6_flow_miss_count, Some(0));
}
