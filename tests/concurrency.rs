//! Concurrent readers performing `longest_prefix_match` while a single
//! writer inserts/deletes must never observe a torn or inconsistent read
//! (§5 "Concurrency & resource model").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use lpm_store::{Backend, Ipv4Table, TableConfig};

mod common {
    pub fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
}

#[test]
fn readers_never_observe_a_broken_table_under_concurrent_writes() {
    common::init();

    for backend in [Backend::Trie, Backend::Hash] {
        let table = Arc::new(Ipv4Table::new(4096, backend, TableConfig::new()).unwrap());
        table.route_add(&[10, 0, 0, 0], 8, 0).unwrap();

        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let (length, _) = table
                            .longest_prefix_match(&[10, 1, 2, 3])
                            .expect("10.0.0.0/8 always covers this destination");
                        assert!(length >= 8);
                    }
                })
            })
            .collect();

        let writer = {
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..500u8 {
                    let octet = 1 + (i % 250);
                    table.route_set(&[10, 0, 0, 0], 8, i as u64).unwrap();
                    let _ = table.route_add(&[10, octet, 0, 0], 24, i as u64);
                    let _ = table.route_delete(&[10, octet, 0, 0], 24);
                }
            })
        };

        writer.join().unwrap();
        stop.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(table.longest_prefix_match(&[10, 1, 2, 3]).unwrap().0, 8);
    }
}
