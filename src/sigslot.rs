//! Typed signal/slot bus.
//!
//! A [`Signal`] broadcasts a value to every connected slot. The delivery
//! discipline is a property of the *receiver*, not the sender: a slot anchored
//! to a direct [`SlotHolder`] runs synchronously on the emitting thread, while
//! a slot anchored to a queued holder has a zero-argument closure (arguments
//! copied) pushed onto the holder's mailbox. A slave receiver is simply a
//! holder queued onto its master's mailbox, so its slots always execute on the
//! master's thread.
//!
//! Connection lifetime is bounded by both endpoints. Dropping the signal
//! discards its connection list; dropping the holder makes every connection
//! aimed at it dead, and dead connections are pruned on the next emit,
//! connect, or count. A destroyed receiver is therefore never invoked,
//! whichever endpoint goes away first.

use std::sync::{Arc, Mutex, Weak};

use crate::queue::Mailbox;

/// A shared slot function with the argument type still visible.
pub type SlotFn<A> = Arc<dyn Fn(A) + Send + Sync>;

pub(crate) enum Delivery {
    Direct,
    Queued(Arc<Mailbox>),
}

/// The per-receiver anchor shared by all slots of one receiver.
pub(crate) struct SlotAnchor {
    delivery: Delivery,
}

/// A receiver identity fixing the delivery discipline of its slots.
///
/// Dropping the holder severs every connection aimed at it.
pub struct SlotHolder {
    anchor: Arc<SlotAnchor>,
}

impl SlotHolder {
    /// Slots run synchronously on the emitting thread.
    pub fn direct() -> Self {
        Self {
            anchor: Arc::new(SlotAnchor {
                delivery: Delivery::Direct,
            }),
        }
    }

    /// Slot invocations are deferred onto `mailbox`.
    pub fn queued(mailbox: Arc<Mailbox>) -> Self {
        Self {
            anchor: Arc::new(SlotAnchor {
                delivery: Delivery::Queued(mailbox),
            }),
        }
    }

    pub(crate) fn anchor(&self) -> &Arc<SlotAnchor> {
        &self.anchor
    }
}

struct Connection<A> {
    anchor: Weak<SlotAnchor>,
    slot: SlotFn<A>,
}

/// Typed many-to-many broadcaster.
///
/// `Signal` is a cheap handle over a shared connection list; clones emit to
/// the same receivers. Multi-argument signals use a tuple for `A`.
///
/// Emission holds the signal's own lock across dispatch, so one `emit` is
/// atomic with respect to `connect`/`disconnect` on the same signal.
/// Consequently a synchronous slot must not connect, disconnect, or re-emit
/// the *same* signal it is being invoked from; doing so deadlocks.
pub struct Signal<A: Clone + Send + 'static> {
    core: Arc<Mutex<Vec<Connection<A>>>>,
}

impl<A: Clone + Send + 'static> Signal<A> {
    pub fn new() -> Self {
        Self {
            core: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connects a slot to run under `holder`'s delivery discipline.
    ///
    /// Connections are visited in registration order on emit and stay live
    /// until either endpoint is dropped or explicitly disconnected.
    pub fn connect<F>(&self, holder: &SlotHolder, slot: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.connect_erased(Arc::downgrade(holder.anchor()), Arc::new(slot));
    }

    pub(crate) fn connect_erased(&self, anchor: Weak<SlotAnchor>, slot: SlotFn<A>) {
        let mut connections = self.core.lock().unwrap();
        connections.retain(|c| c.anchor.strong_count() > 0);
        connections.push(Connection { anchor, slot });
    }

    /// Broadcasts `args` to every live connection, dead ones are pruned.
    pub fn emit(&self, args: A) {
        let mut connections = self.core.lock().unwrap();
        connections.retain(|connection| {
            let Some(anchor) = connection.anchor.upgrade() else {
                return false;
            };
            match &anchor.delivery {
                Delivery::Direct => (connection.slot)(args.clone()),
                Delivery::Queued(mailbox) => {
                    let slot = Arc::clone(&connection.slot);
                    let args = args.clone();
                    mailbox.push(move || slot(args));
                }
            }
            true
        });
    }

    /// Removes every connection aimed at `holder`.
    pub fn disconnect(&self, holder: &SlotHolder) {
        let mut connections = self.core.lock().unwrap();
        connections.retain(|c| match c.anchor.upgrade() {
            Some(anchor) => !Arc::ptr_eq(&anchor, holder.anchor()),
            None => false,
        });
    }

    /// Drops every connection.
    pub fn disconnect_all(&self) {
        self.core.lock().unwrap().clear();
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        let mut connections = self.core.lock().unwrap();
        connections.retain(|c| c.anchor.strong_count() > 0);
        connections.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_count() > 0
    }
}

impl<A: Clone + Send + 'static> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: Clone + Send + 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}
