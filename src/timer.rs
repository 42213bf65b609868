//! Shared timer pool.
//!
//! One worker thread serves every timer in the pool. The worker starts
//! lazily on the first [`TimerPool::create`] call and is joined on
//! [`TimerPool::shutdown`], which guarantees that no callback is still
//! running once shutdown returns.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Identifier of a scheduled timer. Ids are monotonic and never reused; 0 is
/// reserved and never handed out.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u32);

type TimerCallback = Arc<dyn Fn() + Send + Sync>;

struct TimerEntry {
    next: Instant,
    period: Duration,
    callback: TimerCallback,
    running: bool,
}

struct PoolState {
    entries: HashMap<u32, TimerEntry>,
    // References into `entries`, ordered by due time.
    schedule: BTreeSet<(Instant, u32)>,
    next_id: u32,
    done: bool,
    worker: Option<thread::JoinHandle<()>>,
    worker_id: Option<thread::ThreadId>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    wakeup: Condvar,
    reaped: Condvar,
}

/// Worker-thread scheduler for one-shot and periodic callbacks.
pub struct TimerPool {
    shared: Arc<PoolShared>,
}

impl TimerPool {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    entries: HashMap::new(),
                    schedule: BTreeSet::new(),
                    next_id: 1,
                    done: false,
                    worker: None,
                    worker_id: None,
                }),
                wakeup: Condvar::new(),
                reaped: Condvar::new(),
            }),
        }
    }

    /// Schedules `callback` to fire `delay` from now, then every `period`.
    /// A zero period means one-shot; one-shot timers leave the pool after
    /// firing.
    pub fn create<F>(&self, delay: Duration, period: Duration, callback: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.shared.state.lock().unwrap();

        if state.worker.is_none() && !state.done {
            let shared = Arc::clone(&self.shared);
            let handle = thread::spawn(move || worker(shared));
            state.worker_id = Some(handle.thread().id());
            state.worker = Some(handle);
        }

        let id = state.next_id;
        state.next_id += 1;

        let next = Instant::now() + delay;
        state.entries.insert(
            id,
            TimerEntry {
                next,
                period,
                callback: Arc::new(callback),
                running: false,
            },
        );

        // The worker only needs a nudge when the new timer becomes the
        // earliest one.
        let front = state.schedule.iter().next().map(|&(at, _)| at);
        state.schedule.insert((next, id));
        let nudge = front.map_or(true, |at| next < at);
        drop(state);

        if nudge {
            self.shared.wakeup.notify_all();
        }

        TimerId(id)
    }

    /// Cancels a timer.
    ///
    /// If the callback is currently running on the worker thread, the call
    /// blocks until the callback has returned, so the callback is guaranteed
    /// not to touch anything after `destroy` comes back. Calling `destroy`
    /// from inside the callback itself does not block.
    pub fn destroy(&self, id: TimerId) -> bool {
        let mut state = self.shared.state.lock().unwrap();

        let (was_running, next) = match state.entries.get_mut(&id.0) {
            Some(entry) => {
                let was_running = entry.running;
                entry.running = false;
                (was_running, entry.next)
            }
            None => return false,
        };

        if was_running {
            if state.worker_id != Some(thread::current().id()) {
                while state.entries.contains_key(&id.0) {
                    state = self.shared.reaped.wait(state).unwrap();
                }
            }
        } else {
            state.schedule.remove(&(next, id.0));
            state.entries.remove(&id.0);
            drop(state);
            self.shared.wakeup.notify_all();
        }

        true
    }

    /// Cancels every timer currently in the pool. Id uniqueness is preserved.
    pub fn destroy_all(&self) {
        loop {
            let id = {
                let state = self.shared.state.lock().unwrap();
                state.entries.keys().next().copied()
            };
            match id {
                Some(id) => {
                    self.destroy(TimerId(id));
                }
                None => break,
            }
        }
    }

    pub fn size(&self) -> usize {
        self.shared.state.lock().unwrap().entries.len()
    }

    pub fn empty(&self) -> bool {
        self.size() == 0
    }

    /// Stops the worker thread. Every callback has returned when this comes
    /// back; timers still scheduled are dropped without firing.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.done = true;
        let worker = state.worker.take();
        let worker_id = state.worker_id;
        drop(state);

        self.shared.wakeup.notify_all();

        if let Some(worker) = worker {
            if worker_id != Some(thread::current().id()) {
                let _ = worker.join();
            }
        }

        let mut state = self.shared.state.lock().unwrap();
        state.entries.clear();
        state.schedule.clear();
    }
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker(shared: Arc<PoolShared>) {
    let mut state = shared.state.lock().unwrap();

    while !state.done {
        let Some(&(due, id)) = state.schedule.iter().next() else {
            state = shared.wakeup.wait(state).unwrap();
            continue;
        };

        let now = Instant::now();
        if due > now {
            let (guard, _) = shared.wakeup.wait_timeout(state, due - now).unwrap();
            state = guard;
            continue;
        }

        state.schedule.remove(&(due, id));
        let callback = match state.entries.get_mut(&id) {
            Some(entry) => {
                // Marked so a racing destroy() knows to wait for us.
                entry.running = true;
                Arc::clone(&entry.callback)
            }
            None => continue,
        };

        drop(state);
        callback();
        state = shared.state.lock().unwrap();

        let mut rearm = None;
        let mut reap = false;
        match state.entries.get_mut(&id) {
            Some(entry) if entry.running => {
                entry.running = false;
                if entry.period > Duration::ZERO {
                    entry.next += entry.period;
                    rearm = Some(entry.next);
                }
            }
            // destroy() ran while the callback was in flight and is now
            // blocked on `reaped`.
            Some(_) => reap = true,
            None => {}
        }
        match rearm {
            Some(at) => {
                state.schedule.insert((at, id));
            }
            None => {
                state.entries.remove(&id);
            }
        }
        if reap {
            shared.reaped.notify_all();
        }
    }
}
