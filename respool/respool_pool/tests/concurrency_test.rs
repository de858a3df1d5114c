//! Multi-threaded pool behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use respool_pool::{Pool, PoolError};

#[test]
fn test_borrowed_never_exceeds_capacity() {
    let pool = Pool::from_fn("shared", 3, || 0u64).unwrap();
    pool.set_retry_attempts(200)
        .set_retry_delay(Duration::from_millis(10));

    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..25 {
                    pool.with_resource(|_| {
                        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        in_use.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, PoolError>(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(pool.is_full());

    let stats = pool.stats();
    assert_eq!(stats.acquired, 200);
    assert_eq!(stats.released, 200);
    assert!(stats.created <= 3);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_waiter_wakes_on_release() {
    let pool = Pool::from_fn("wake", 1, || "only").unwrap();
    pool.set_retry_attempts(2)
        .set_retry_delay(Duration::from_secs(10));

    let held = pool.acquire().unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let waiter = {
        let pool = pool.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let start = Instant::now();
            let handle = pool.acquire().unwrap();
            let waited = start.elapsed();
            pool.release(&handle).unwrap();
            waited
        })
    };

    barrier.wait();
    thread::sleep(Duration::from_millis(50));
    pool.release(&held).unwrap();

    // far below the 10s budget: the release woke the waiter
    let waited = waiter.join().unwrap();
    assert!(waited < Duration::from_secs(5), "waited {:?}", waited);
    assert!(pool.is_full());
}

#[test]
fn test_waiters_time_out_independently() {
    let pool = Pool::from_fn("timeout", 1, || ()).unwrap();
    let _held = pool.acquire().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire_timeout(Duration::from_millis(50)))
        })
        .collect();

    for waiter in waiters {
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(PoolError::Empty { .. })));
    }
    assert_eq!(pool.stats().exhausted, 3);
}

#[test]
fn test_concurrent_construction_respects_capacity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pool = Pool::from_fn("slow", 2, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        "built"
    })
    .unwrap();
    pool.set_retry_attempts(1);

    let barrier = Arc::new(Barrier::new(4));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.acquire()
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    let acquired = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(acquired, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pool.count() + pool.borrowed_count() + pool.pending_count(), 2);
}

#[test]
fn test_invariant_after_mixed_load() {
    let pool = Pool::from_fn("mixed", 4, || 7u8).unwrap();
    pool.set_retry_attempts(50)
        .set_retry_delay(Duration::from_millis(5));

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let pool = pool.clone();
            thread::spawn(move || {
                for step in 0..40 {
                    let handle = match pool.acquire() {
                        Ok(handle) => handle,
                        Err(PoolError::Empty { .. }) => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                    if (worker + step) % 7 == 0 {
                        handle.discard().unwrap();
                    } else {
                        handle.release().unwrap();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.idle + stats.borrowed + stats.pending, stats.capacity);
    assert_eq!(stats.borrowed, 0);
    assert_eq!(stats.acquired, stats.released + stats.discarded);
}
