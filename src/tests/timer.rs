use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::timer::{TimerId, TimerPool};

#[test]
fn one_shot_fires_once_and_leaves_the_pool() {
    let pool = TimerPool::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&hits);
    pool.create(Duration::from_millis(5), Duration::ZERO, move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(150));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(pool.empty());
}

#[test]
fn periodic_fires_until_destroyed() {
    let pool = TimerPool::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&hits);
    let id = pool.create(Duration::from_millis(5), Duration::from_millis(5), move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(80));
    assert!(pool.destroy(id));

    let frozen = hits.load(Ordering::SeqCst);
    assert!(frozen >= 2, "only {frozen} firings in 80ms");

    thread::sleep(Duration::from_millis(40));
    assert_eq!(hits.load(Ordering::SeqCst), frozen);
    assert!(pool.empty());
}

#[test]
fn destroying_an_unknown_id_reports_false() {
    let pool = TimerPool::new();
    assert!(!pool.destroy(TimerId(1234)));
}

#[test]
fn ids_are_never_reused() {
    let pool = TimerPool::new();
    let first = pool.create(Duration::from_secs(60), Duration::ZERO, || {});
    pool.destroy(first);
    let second = pool.create(Duration::from_secs(60), Duration::ZERO, || {});
    assert_ne!(first, second);
    pool.destroy_all();
    assert!(pool.empty());
}

#[test]
fn destroy_blocks_until_an_in_flight_callback_returns() {
    let pool = TimerPool::new();
    let entered = Arc::new(AtomicBool::new(false));
    let returned = Arc::new(AtomicBool::new(false));

    let id = {
        let entered = Arc::clone(&entered);
        let returned = Arc::clone(&returned);
        pool.create(Duration::from_millis(1), Duration::ZERO, move || {
            entered.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(80));
            returned.store(true, Ordering::SeqCst);
        })
    };

    while !entered.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    pool.destroy(id);
    assert!(returned.load(Ordering::SeqCst));
    assert!(pool.empty());
}

#[test]
fn a_callback_may_destroy_its_own_timer() {
    let pool = Arc::new(TimerPool::new());
    let own_id: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

    let id = {
        let pool_ref = Arc::clone(&pool);
        let own_id = Arc::clone(&own_id);
        pool.create(Duration::from_millis(20), Duration::ZERO, move || {
            if let Some(id) = *own_id.lock().unwrap() {
                pool_ref.destroy(id);
            }
        })
    };
    *own_id.lock().unwrap() = Some(id);

    thread::sleep(Duration::from_millis(120));
    assert_eq!(pool.size(), 0);
}

#[test]
fn shutdown_drops_pending_timers_without_firing() {
    let pool = TimerPool::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&hits);
    pool.create(Duration::from_secs(60), Duration::ZERO, move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    pool.shutdown();
    assert!(pool.empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
