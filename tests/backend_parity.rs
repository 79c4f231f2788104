//! S7 — the trie backend and the hash backend must agree on every lookup
//! for the same sequence of inserts/deletes, supplementing the original
//! test suite's "Trie vs Hash" parity matrix.

use lpm_store::{Backend, Ipv4Table, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

fn build(backend: Backend) -> Ipv4Table {
    let table = Ipv4Table::new(64, backend, TableConfig::new()).unwrap();

    let routes: &[(u8, u8, u8, u8, u8, u64)] = &[
        (0, 0, 0, 0, 0, 1),
        (10, 0, 0, 0, 8, 2),
        (10, 1, 0, 0, 16, 3),
        (10, 1, 2, 0, 24, 4),
        (10, 2, 0, 0, 16, 5),
        (172, 16, 0, 0, 12, 6),
        (192, 168, 1, 0, 24, 7),
    ];
    for &(a, b, c, d, len, value) in routes {
        table.route_add(&[a, b, c, d], len, value).unwrap();
    }
    table.route_delete(&[10, 2, 0, 0], 16).unwrap();
    table
}

#[test]
fn trie_and_hash_agree_on_every_query() {
    common::init();
    let trie = build(Backend::Trie);
    let hash = build(Backend::Hash);

    let queries: &[[u8; 4]] = &[
        [10, 1, 2, 3],
        [10, 1, 3, 0],
        [10, 2, 0, 1],
        [10, 9, 9, 9],
        [172, 16, 5, 5],
        [172, 32, 0, 1],
        [192, 168, 1, 200],
        [192, 168, 2, 1],
        [8, 8, 8, 8],
    ];

    for q in queries {
        assert_eq!(
            trie.longest_prefix_match(q),
            hash.longest_prefix_match(q),
            "mismatch for query {q:?}"
        );
    }
}
