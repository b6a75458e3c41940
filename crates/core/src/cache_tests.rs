// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn factory_runs_once_per_type() {
    let cache = ActionCache::new();

    let first = cache.get_with(|| vec![1u32, 2, 3]);
    let second = cache.get_with::<Vec<u32>, _>(|| panic!("factory must not rerun"));

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*second, vec![1, 2, 3]);
}

#[test]
fn entries_are_keyed_by_type() {
    let cache = ActionCache::new();
    let numbers = cache.get_with(|| 7u64);
    let text = cache.get_with(|| "probe".to_string());

    assert_eq!(*numbers, 7);
    assert_eq!(*text, "probe");
}

#[test]
fn concurrent_lookups_share_one_entry() {
    let cache = Arc::new(ActionCache::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || cache.get_with(|| 42u32)));
    }
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.join().unwrap());
    }
    for value in &values {
        assert!(Arc::ptr_eq(value, &values[0]));
    }
}
