use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::queue::Mailbox;

#[test]
fn jobs_run_in_push_order() {
    let mailbox = Mailbox::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..4 {
        let order = Arc::clone(&order);
        mailbox.push(move || order.lock().unwrap().push(i));
    }

    assert_eq!(mailbox.len(), 4);
    mailbox.call_all();
    assert_eq!(order.lock().unwrap().as_slice(), &[0, 1, 2, 3]);
    assert!(mailbox.is_empty());
}

#[test]
fn call_one_reports_whether_a_job_ran() {
    let mailbox = Mailbox::new();
    assert!(!mailbox.call_one());

    mailbox.push(|| {});
    assert!(mailbox.call_one());
    assert!(!mailbox.call_one());
}

#[test]
fn call_limits_the_number_of_invocations() {
    let mailbox = Mailbox::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let hits = Arc::clone(&hits);
        mailbox.push(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    mailbox.call(3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(mailbox.len(), 2);
}

#[test]
fn a_job_may_push_into_its_own_mailbox() {
    let mailbox = Arc::new(Mailbox::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let reentrant = Arc::clone(&mailbox);
    let outer_hits = Arc::clone(&hits);
    mailbox.push(move || {
        outer_hits.fetch_add(1, Ordering::SeqCst);
        let inner_hits = Arc::clone(&outer_hits);
        reentrant.push(move || {
            inner_hits.fetch_add(1, Ordering::SeqCst);
        });
    });

    mailbox.call_all();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(mailbox.is_empty());
}

#[test]
fn wait_for_times_out_on_an_empty_queue() {
    let mailbox = Mailbox::new();
    assert!(!mailbox.wait_for(Duration::from_millis(20)));
}

#[test]
fn wait_returns_once_a_job_arrives() {
    let mailbox = Arc::new(Mailbox::new());

    let pusher = {
        let mailbox = Arc::clone(&mailbox);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            mailbox.push(|| {});
        })
    };

    mailbox.wait();
    assert!(!mailbox.is_empty());
    pusher.join().expect("pusher thread");
}

#[test]
fn clear_drops_jobs_without_running_them() {
    let mailbox = Mailbox::new();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let hits = Arc::clone(&hits);
        mailbox.push(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    mailbox.clear();
    assert!(mailbox.is_empty());
    mailbox.call_all();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
