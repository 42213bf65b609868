use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::queue::Mailbox;
use crate::sigslot::{Signal, SlotHolder};

#[test]
fn direct_slots_run_synchronously() {
    let holder = SlotHolder::direct();
    let hits = Arc::new(AtomicUsize::new(0));

    let signal: Signal<i32> = Signal::new();
    let probe = Arc::clone(&hits);
    signal.connect(&holder, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    signal.emit(42);
    signal.emit(7);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn queued_slots_defer_until_the_mailbox_drains() {
    let mailbox = Arc::new(Mailbox::new());
    let holder = SlotHolder::queued(Arc::clone(&mailbox));
    let values = Arc::new(Mutex::new(Vec::new()));

    let signal: Signal<i32> = Signal::new();
    let probe = Arc::clone(&values);
    signal.connect(&holder, move |v| probe.lock().unwrap().push(v));

    signal.emit(1);
    signal.emit(2);
    assert!(values.lock().unwrap().is_empty());
    assert_eq!(mailbox.len(), 2);

    mailbox.call_all();
    assert_eq!(values.lock().unwrap().as_slice(), &[1, 2]);
}

#[test]
fn tuple_arguments_fan_out_to_every_receiver() {
    let first = SlotHolder::direct();
    let second = SlotHolder::direct();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let signal: Signal<(i32, String)> = Signal::new();
    for holder in [&first, &second] {
        let seen = Arc::clone(&seen);
        signal.connect(holder, move |(n, text)| {
            seen.lock().unwrap().push((n, text));
        });
    }

    signal.emit((3, "hello".to_string()));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(n, text)| *n == 3 && text == "hello"));
}

#[test]
fn dropping_the_receiver_severs_the_connection() {
    let signal: Signal<i32> = Signal::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let holder = SlotHolder::direct();
    let probe = Arc::clone(&hits);
    signal.connect(&holder, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(signal.connection_count(), 1);

    drop(holder);
    assert_eq!(signal.connection_count(), 0);
    signal.emit(1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // A fresh receiver connects into a clean list.
    let holder = SlotHolder::direct();
    let probe = Arc::clone(&hits);
    signal.connect(&holder, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(signal.connection_count(), 1);
    signal.emit(2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn disconnect_removes_only_that_receiver() {
    let signal: Signal<i32> = Signal::new();
    let kept = SlotHolder::direct();
    let dropped = SlotHolder::direct();
    let kept_hits = Arc::new(AtomicUsize::new(0));
    let dropped_hits = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&kept_hits);
    signal.connect(&kept, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    let probe = Arc::clone(&dropped_hits);
    signal.connect(&dropped, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    signal.disconnect(&dropped);
    signal.emit(9);

    assert_eq!(kept_hits.load(Ordering::SeqCst), 1);
    assert_eq!(dropped_hits.load(Ordering::SeqCst), 0);
    assert_eq!(signal.connection_count(), 1);
}

#[test]
fn clones_share_the_connection_list() {
    let signal: Signal<i32> = Signal::new();
    let twin = signal.clone();
    let holder = SlotHolder::direct();
    let hits = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&hits);
    signal.connect(&holder, move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
    });

    twin.emit(1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(twin.is_connected());
}

#[test]
fn slave_delivery_lands_in_the_master_mailbox() {
    let master_mailbox = Arc::new(Mailbox::new());
    // A slave receiver is anchored onto its master's mailbox.
    let slave = SlotHolder::queued(Arc::clone(&master_mailbox));
    let values = Arc::new(Mutex::new(Vec::new()));

    let signal: Signal<i32> = Signal::new();
    let probe = Arc::clone(&values);
    signal.connect(&slave, move |v| probe.lock().unwrap().push(v));

    signal.emit(5);
    assert!(values.lock().unwrap().is_empty());
    assert_eq!(master_mailbox.len(), 1);

    master_mailbox.call_all();
    assert_eq!(values.lock().unwrap().as_slice(), &[5]);
}
