//! Socket-driven detach and array teardown.
//!
//! ## Lock order
//!
//! 1. The array's write lock.
//! 2. One socket's private lock.
//!
//! Never the reverse, and never two socket locks at once. Detach is the only
//! path that writes a slot without (1); it holds (2) for the socket being
//! detached and clears the slot with a compare-and-swap so that a slot
//! already handed to another socket is left alone.
//!
//! ## Tracing
//!
//! - **Target**: `reuseport.lifecycle`
//!   - `TRACE`: detach outcome per socket
//!   - `DEBUG`: teardown start
//!   - `INFO`: teardown complete with the number of slots cleared

use std::sync::Arc;
use std::sync::atomic::Ordering;

use reuseport_sock::{SlotRelease, Socket};

use crate::array::{ReuseportArray, STATE_FREED, STATE_FREEING, STATE_LIVE, SlotTable};

impl SlotRelease for SlotTable {
    fn release_slot(&self, index: u32, sk: &Socket) -> bool {
        let Some(slot) = self.slot(index) else {
            return false;
        };
        let previous = slot.compare_and_swap(std::ptr::from_ref(sk), None::<Arc<Socket>>);
        let released = previous
            .as_deref()
            .is_some_and(|occupant| std::ptr::eq(occupant, sk));
        if released {
            self.metrics.record_detach();
        }
        tracing::trace!(
            target: "reuseport.lifecycle",
            registry = self.id.get(),
            index,
            sk = sk.serial(),
            released,
            "detach"
        );
        released
    }
}

/// Remove `sk` from whatever array slot it occupies.
///
/// Entry point for the socket subsystem's teardown paths. Equivalent to
/// [`Socket::detach_reuseport`]; a socket with no array binding is left
/// untouched.
pub fn detach(sk: &Socket) -> bool {
    sk.detach_reuseport()
}

impl ReuseportArray {
    /// Tear the array down.
    ///
    /// Waits until every [`SocketRef`](crate::SocketRef) obtained before the
    /// call has been dropped, then unbinds and empties every slot. Later
    /// updates and deletes fail with [`ReuseportError::Freed`] and lookups
    /// find nothing. Calling it again is a no-op.
    pub fn free(&self) {
        if self
            .state
            .compare_exchange(
                STATE_LIVE,
                STATE_FREEING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }
        tracing::debug!(
            target: "reuseport.lifecycle",
            registry = self.table.id.get(),
            readers = self.grace.active_readers(),
            "array teardown started"
        );

        self.grace.synchronize();

        let cleared = {
            let _write_guard = self.write_lock.lock();
            self.clear_all()
        };
        self.state.store(STATE_FREED, Ordering::SeqCst);
        self.table.metrics.record_freed_slots(cleared);

        tracing::info!(
            target: "reuseport.lifecycle",
            registry = self.table.id.get(),
            cleared,
            "array freed"
        );
    }

    /// Unbind and empty every slot. Caller holds the write lock. Returns the
    /// number of bindings this call cleared.
    fn clear_all(&self) -> u64 {
        let mut cleared = 0_u64;
        for (index, slot) in (0_u32..).zip(self.table.slots.iter()) {
            let Some(sk) = slot.load_full() else {
                continue;
            };
            let mut guard = sk.lock();
            // A detach that got the socket lock first has already emptied
            // the slot and counted it.
            if guard.clear_binding_if(self.table.id, index) {
                cleared += 1;
            }
            slot.store(None);
            drop(guard);
        }
        cleared
    }

    /// Indices of occupied slots whose socket is not bound to
    /// `(this array, index)`. Empty when the binding invariant holds.
    ///
    /// Takes the write lock, so the answer is exact with respect to updates
    /// and deletes. A concurrent detach may empty a slot between the load and
    /// the binding check; that slot is skipped.
    pub fn check_bindings(&self) -> Vec<u32> {
        let _write_guard = self.write_lock.lock();
        let mut violations = Vec::new();
        for (index, slot) in (0_u32..).zip(self.table.slots.iter()) {
            let Some(sk) = slot.load_full() else {
                continue;
            };
            let bound = sk
                .lock()
                .binding()
                .is_some_and(|b| b.refers_to(self.table.id, index));
            let still_there = slot
                .load()
                .as_deref()
                .is_some_and(|cur| std::ptr::eq(cur, &*sk));
            if !bound && still_there {
                tracing::warn!(
                    target: "reuseport.lifecycle",
                    registry = self.table.id.get(),
                    index,
                    sk = sk.serial(),
                    "slot occupant is not bound to its slot"
                );
                violations.push(index);
            }
        }
        violations
    }
}

impl Drop for ReuseportArray {
    fn drop(&mut self) {
        self.free();
    }
}
