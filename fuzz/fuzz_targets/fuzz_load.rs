//! Fuzz testing for the binary loader.
//!
//! This fuzz target feeds arbitrary bytes to `DataStore::load` to ensure
//! malformed or truncated files are rejected without panicking. Stores that
//! load and pass the integrity check must then render, hash, save and load
//! again to a store that still passes the check.

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;

use datastore::{DataStore, Platform};

fuzz_target!(|data: &[u8]| {
    if data.len() > 1 << 20 {
        return;
    }

    let mut store = DataStore::new();
    if store.load(&mut Cursor::new(data)).is_err() {
        assert!(store.root_node().is_null());
        return;
    }
    if !store.verify_integrity() {
        return;
    }

    let _ = store.to_text(true, true);
    let _ = store.compute_md5();

    let mut out = Cursor::new(Vec::new());
    store
        .save(&mut out, Platform::current(), true)
        .expect("verified store must save");
    let bytes = out.into_inner();

    let mut reloaded = DataStore::new();
    reloaded
        .load(&mut Cursor::new(bytes.as_slice()))
        .expect("saved store must load");
    assert!(reloaded.verify_integrity());
});
