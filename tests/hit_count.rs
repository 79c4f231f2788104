//! S4 — hit counting is opt-in and `route_get`'s `clear_hit_count` resets it.

use lpm_store::{Backend, Ipv4Table, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

#[test]
fn hit_count_is_none_when_not_enabled() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Trie, TableConfig::new()).unwrap();
    table.route_add(&[10, 0, 0, 0], 8, 42).unwrap();
    let (value, hit_count) = table.route_get(&[10, 0, 0, 0], 8, false).unwrap();
    assert_eq!(value, 42);
    assert_eq!(hit_count, None);
}

#[test]
fn hit_count_increments_on_lpm_and_resets_on_clear() {
    common::init();
    for backend in [Backend::Trie, Backend::Hash] {
        let table = Ipv4Table::new(4, backend, TableConfig::new().with_hit_count(true)).unwrap();
        table.route_add(&[10, 0, 0, 0], 8, 42).unwrap();

        for _ in 0..5 {
            table.longest_prefix_match(&[10, 1, 2, 3]).unwrap();
        }

        let (_, hit_count) = table.route_get(&[10, 0, 0, 0], 8, false).unwrap();
        assert_eq!(hit_count, Some(5));

        let (_, hit_count) = table.route_get(&[10, 0, 0, 0], 8, true).unwrap();
        assert_eq!(hit_count, Some(5));

        let (_, hit_count) = table.route_get(&[10, 0, 0, 0], 8, false).unwrap();
        assert_eq!(hit_count, Some(0));
    }
}

#[test]
fn route_set_updates_value_without_disturbing_hit_count() {
    common::init();
    let table = Ipv4Table::new(4, Backend::Hash, TableConfig::new().with_hit_count(true)).unwrap();
    table.route_add(&[10, 0, 0, 0], 8, 1).unwrap();
    table.longest_prefix_match(&[10, 1, 2, 3]).unwrap();
    table.route_set(&[10, 0, 0, 0], 8, 2).unwrap();

    let (value, hit_count) = table.route_get(&[10, 0, 0, 0], 8, false).unwrap();
    assert_eq!(value, 2);
    assert_eq!(hit_count, Some(1));
}
