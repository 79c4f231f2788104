//! S5 — ordered enumeration visits every route exactly once, in descending
//! prefix-length order and, within a length, ascending prefix order.

use lpm_store::{Backend, Ipv4Table, LpmError, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

#[test]
fn enumeration_disabled_by_default() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Trie, TableConfig::new()).unwrap();
    table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
    assert_eq!(table.route_first_get(false), Err(LpmError::Unsupported));
}

#[test]
fn first_get_on_empty_enumeration_is_empty() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Trie, TableConfig::new().with_next_get(true)).unwrap();
    assert_eq!(table.route_first_get(false), Err(LpmError::Empty));
}

#[test]
fn walks_every_route_in_composite_order() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table =
            Ipv4Table::new(8, backend, TableConfig::new().with_next_get(true)).unwrap();

        // Inserted out of order on purpose.
        table.route_add(&[10, 1, 0, 0], 16, 1).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 2).unwrap();
        table.route_add(&[10, 0, 0, 0], 16, 3).unwrap();
        table.route_add(&[11, 0, 0, 0], 8, 4).unwrap();

        // Expected order: length 16 ascending prefix, then length 8
        // ascending prefix.
        let expected = [
            (vec![10, 0, 0, 0], 16u8, 3u64),
            (vec![10, 1, 0, 0], 16u8, 1u64),
            (vec![10, 0, 0, 0], 8u8, 2u64),
            (vec![11, 0, 0, 0], 8u8, 4u64),
        ];

        let (mut prefix, mut length, value, _) = table.route_first_get(false).unwrap();
        let mut seen = vec![(prefix.clone(), length, value)];
        loop {
            match table.route_next_get(&prefix, length, false) {
                Ok((next_prefix, next_length, next_value, _)) => {
                    seen.push((next_prefix.clone(), next_length, next_value));
                    prefix = next_prefix;
                    length = next_length;
                }
                Err(LpmError::NotFound) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(seen, expected);
    }
}

#[test]
fn deleted_route_drops_out_of_enumeration() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Hash, TableConfig::new().with_next_get(true)).unwrap();
    table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
    table.route_add(&[11, 0, 0, 0], 8, 2).unwrap();
    table.route_delete(&[10, 0, 0, 0], 8).unwrap();

    let (prefix, length, value, _) = table.route_first_get(false).unwrap();
    assert_eq!((prefix, length, value), (vec![11, 0, 0, 0], 8, 2));
    assert_eq!(
        table.route_next_get(&[11, 0, 0, 0], 8, false),
        Err(LpmError::NotFound)
    );
}
