//! Deferred-callback mailbox.
//!
//! Every cross-thread hand-off in the runtime goes through a [`Mailbox`]:
//! queued slot invocations, timer firings routed to a module, and log
//! messages deferred onto the dispatcher. A mailbox is a FIFO of
//! zero-argument jobs with wait/notify semantics.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A queued zero-argument invocation.
pub type Job = Box<dyn FnOnce() + Send>;

/// Storage grows in chunks of this many slots.
const GROWTH: usize = 64;

/// Thread-safe FIFO of deferred invocations.
///
/// The queue mutex is never held while a job runs, so a job may freely push
/// further work into the mailbox it was popped from.
pub struct Mailbox {
    queue: Mutex<VecDeque<Job>>,
    ready: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(GROWTH)),
            ready: Condvar::new(),
        }
    }

    /// Appends a job and wakes one waiter. Never blocks on a full queue.
    pub fn push<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() == queue.capacity() {
            queue.reserve(GROWTH);
        }
        queue.push_back(Box::new(job));
        self.ready.notify_one();
    }

    /// Removes the front job without invoking it.
    pub fn try_pop(&self) -> Option<Job> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Pops one job and invokes it with the queue lock released.
    ///
    /// Returns whether a job ran.
    pub fn call_one(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Invokes up to `max` jobs while the queue is non-empty.
    pub fn call(&self, max: usize) {
        for _ in 0..max {
            if !self.call_one() {
                break;
            }
        }
    }

    /// Drains the queue. Jobs pushed by running jobs are drained as well; the
    /// loop stops at the first empty-at-check-time snapshot.
    pub fn call_all(&self) {
        while self.call_one() {}
    }

    /// Blocks until the queue is non-empty.
    pub fn wait(&self) {
        let mut queue = self.queue.lock().unwrap();
        while queue.is_empty() {
            queue = self.ready.wait(queue).unwrap();
        }
    }

    /// Blocks until the queue is non-empty or `timeout` elapses. Spurious
    /// wake-ups are permitted; the return value reports whether the queue was
    /// non-empty when the call returned.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let queue = self.queue.lock().unwrap();
        if !queue.is_empty() {
            return true;
        }
        let (queue, _) = self.ready.wait_timeout(queue, timeout).unwrap();
        !queue.is_empty()
    }

    /// Drops every queued job without invoking it.
    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
