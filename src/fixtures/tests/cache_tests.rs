//! Session cache behavior: memoization, concurrency, and outcome replay

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use crate::cache::{session, SessionCache};
use crate::error::{Error, Result};
use crate::fixtures;

#[test]
fn test_builder_runs_at_most_once() {
    let cache = SessionCache::new();
    let calls = AtomicUsize::new(0);

    let first: Arc<String> = cache
        .get_or_create("expensive", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("built".to_string())
        })
        .unwrap();
    let second: Arc<String> = cache
        .get_or_create("expensive", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("rebuilt".to_string())
        })
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*first, "built");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_first_access_builds_once() {
    fixtures::init_test_logging();
    let cache = Arc::new(SessionCache::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            std::thread::spawn(move || {
                cache
                    .get_or_create("shared", move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Lengthen the race window.
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok(42u64)
                    })
                    .map(|value| *value)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_distinct_keys_build_independently() {
    let cache = SessionCache::new();
    let a: Arc<u32> = cache.get_or_create("key-a", || Ok(1)).unwrap();
    let b: Arc<u32> = cache.get_or_create("key-b", || Ok(2)).unwrap();

    assert_eq!((*a, *b), (1, 2));
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("key-a"));
    assert!(!cache.contains("key-c"));
}

#[test]
fn test_unavailability_is_memoized_as_skip() {
    let cache = SessionCache::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let result: Result<Arc<u32>> = cache.get_or_create("needs-hub", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::unavailable("model hub", "feature disabled"))
        });
        assert!(result.unwrap_err().is_unavailable());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_build_failure_is_replayed_not_retried() {
    let cache = SessionCache::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let result: Result<Arc<u32>> = cache.get_or_create("broken", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::config("corrupt fixture data"))
        });
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Build { .. }), "got {err}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wrong_type_request_is_rejected() {
    let cache = SessionCache::new();
    let _value: Arc<String> = cache
        .get_or_create("typed", || Ok("text".to_string()))
        .unwrap();

    let result: Result<Arc<u64>> = cache.get_or_create("typed", || Ok(7));
    assert!(matches!(result.unwrap_err(), Error::TypeMismatch { .. }));
}

#[test]
fn test_nested_builders_may_use_other_keys() {
    let cache = SessionCache::new();
    let combined: Arc<String> = cache
        .get_or_create("outer", || {
            let inner = cache.get_or_create("inner", || Ok("core".to_string()))?;
            Ok(format!("outer-around-{}", inner))
        })
        .unwrap();

    assert_eq!(*combined, "outer-around-core");
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_global_session_cache_is_shared() {
    let a: Arc<u32> = session().get_or_create("global-smoke", || Ok(9)).unwrap();
    let b: Arc<u32> = session().get_or_create("global-smoke", || Ok(10)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

proptest! {
    #[test]
    fn test_memoization_holds_for_arbitrary_keys(key in "[a-z-]{1,24}", value in any::<u32>()) {
        let cache = SessionCache::new();
        let first = cache.get_or_create(&key, || Ok(value)).unwrap();
        let second = cache.get_or_create(&key, || Ok(value.wrapping_add(1))).unwrap();
        prop_assert_eq!(*first, value);
        prop_assert!(Arc::ptr_eq(&first, &second));
    }
}
