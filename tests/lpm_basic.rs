//! S1 (two-route LPM precedence), S2 (default route), S3 (duplicate/capacity).

use lpm_store::{Backend, Ipv4Table, LpmError, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

#[test]
fn longer_prefix_wins_over_shorter_for_both_backends() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(16, backend, TableConfig::new()).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 100).unwrap();
        table.route_add(&[10, 1, 0, 0], 16, 200).unwrap();

        assert_eq!(table.longest_prefix_match(&[10, 1, 2, 3]).unwrap(), (16, 200));
        assert_eq!(table.longest_prefix_match(&[10, 2, 2, 3]).unwrap(), (8, 100));
    }
}

#[test]
fn default_route_matches_anything_with_no_more_specific() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(4, backend, TableConfig::new()).unwrap();
        table.route_add(&[0, 0, 0, 0], 0, 1).unwrap();
        table.route_add(&[192, 168, 0, 0], 16, 2).unwrap();

        assert_eq!(table.longest_prefix_match(&[8, 8, 8, 8]).unwrap(), (0, 1));
        assert_eq!(
            table.longest_prefix_match(&[192, 168, 1, 1]).unwrap(),
            (16, 2)
        );
    }
}

#[test]
fn lookup_against_an_empty_table_is_not_found() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Trie, TableConfig::new()).unwrap();
    assert_eq!(
        table.longest_prefix_match(&[1, 2, 3, 4]),
        Err(LpmError::NotFound)
    );
}

#[test]
fn duplicate_insert_is_rejected() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(4, backend, TableConfig::new()).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
        assert_eq!(
            table.route_add(&[10, 0, 0, 0], 8, 2),
            Err(LpmError::AlreadyExists)
        );
    }
}

#[test]
fn capacity_is_enforced() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(2, backend, TableConfig::new()).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
        table.route_add(&[11, 0, 0, 0], 8, 2).unwrap();
        assert_eq!(
            table.route_add(&[12, 0, 0, 0], 8, 3),
            Err(LpmError::CapacityExceeded)
        );
    }
}

#[test]
fn delete_then_reinsert_succeeds() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(4, backend, TableConfig::new()).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
        table.route_delete(&[10, 0, 0, 0], 8).unwrap();
        assert_eq!(
            table.longest_prefix_match(&[10, 1, 2, 3]),
            Err(LpmError::NotFound)
        );
        table.route_add(&[10, 0, 0, 0], 8, 2).unwrap();
        assert_eq!(table.longest_prefix_match(&[10, 1, 2, 3]).unwrap(), (8, 2));
    }
}

#[test]
fn delete_of_absent_route_is_not_found() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Hash, TableConfig::new()).unwrap();
    assert_eq!(
        table.route_delete(&[10, 0, 0, 0], 8),
        Err(LpmError::NotFound)
    );
}

#[test]
fn zero_max_routes_is_rejected_at_construction() {
    assert_eq!(
        Ipv4Table::new(0, Backend::Trie, TableConfig::new()).unwrap_err(),
        LpmError::InvalidArgument
    );
}

#[test]
fn wrong_byte_width_is_invalid_argument() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Trie, TableConfig::new()).unwrap();
    assert_eq!(
        table.route_add(&[10, 0, 0, 0, 0], 8, 1),
        Err(LpmError::InvalidArgument)
    );
}
