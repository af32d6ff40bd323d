//! The slot array: lock-free lookup, control-plane update and delete.
//!
//! Each slot is a single atomic pointer that is either empty or refers to a
//! socket. Readers load it with no lock. All control-plane mutations are
//! serialized by the array's write lock and, inside it, by the target
//! socket's private lock. The one mutation made without the write lock is
//! the socket-driven detach in [`crate::lifecycle`].

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use arc_swap::Guard;
use parking_lot::Mutex;
use reuseport_error::{ReuseportError, Result};
use reuseport_sock::{
    ArrayBinding, Family, Protocol, RegistryId, SlotRelease, SockFlags, SockType, Socket,
};

use crate::grace::{Quiescence, QuiescenceConfig, ReadSection};
use crate::map::{MapAttr, alloc_check};
use crate::metrics::ArrayMetrics;

pub(crate) const STATE_LIVE: u8 = 0;
pub(crate) const STATE_FREEING: u8 = 1;
pub(crate) const STATE_FREED: u8 = 2;

// ---------------------------------------------------------------------------
// UpdateFlags
// ---------------------------------------------------------------------------

/// Existence requirement for an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateFlags {
    /// Create or replace.
    Any,
    /// Slot must be empty.
    NoExist,
    /// Slot must be occupied.
    Exist,
}

impl UpdateFlags {
    /// Raw `BPF_ANY`.
    pub const RAW_ANY: u64 = 0;
    /// Raw `BPF_NOEXIST`.
    pub const RAW_NOEXIST: u64 = 1;
    /// Raw `BPF_EXIST`.
    pub const RAW_EXIST: u64 = 2;

    /// Decode raw flags. Anything above `EXIST` is rejected.
    pub const fn from_raw(raw: u64) -> Result<Self> {
        match raw {
            Self::RAW_ANY => Ok(Self::Any),
            Self::RAW_NOEXIST => Ok(Self::NoExist),
            Self::RAW_EXIST => Ok(Self::Exist),
            flags => Err(ReuseportError::InvalidFlags { flags }),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::Any => Self::RAW_ANY,
            Self::NoExist => Self::RAW_NOEXIST,
            Self::Exist => Self::RAW_EXIST,
        }
    }
}

// ---------------------------------------------------------------------------
// SlotTable
// ---------------------------------------------------------------------------

/// Backing storage shared between the array and its sockets' bindings.
///
/// Bindings hold it weakly; the array holds the only strong handle.
pub(crate) struct SlotTable {
    pub(crate) id: RegistryId,
    pub(crate) slots: Box<[ArcSwapOption<Socket>]>,
    pub(crate) metrics: ArrayMetrics,
}

impl SlotTable {
    #[inline]
    pub(crate) fn slot(&self, index: u32) -> Option<&ArcSwapOption<Socket>> {
        self.slots.get(usize::try_from(index).ok()?)
    }
}

// ---------------------------------------------------------------------------
// SocketRef
// ---------------------------------------------------------------------------

/// Borrowed result of a lookup.
///
/// Valid until dropped; it keeps the array's teardown from completing while
/// alive, so hold it only for the duration of a dispatch decision.
pub struct SocketRef<'a> {
    sk: Guard<Option<Arc<Socket>>>,
    _section: ReadSection<'a>,
}

impl SocketRef<'_> {
    /// Whether this reference and `other` name the same socket.
    #[must_use]
    pub fn is(&self, other: &Socket) -> bool {
        std::ptr::eq(&**self, other)
    }
}

impl Deref for SocketRef<'_> {
    type Target = Socket;

    fn deref(&self) -> &Socket {
        self.sk
            .as_deref()
            .unwrap_or_else(|| unreachable!("SocketRef is only built from an occupied slot"))
    }
}

impl fmt::Debug for SocketRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SocketRef").field(&**self).finish()
    }
}

// ---------------------------------------------------------------------------
// ReuseportArray
// ---------------------------------------------------------------------------

/// Fixed-capacity array of socket references indexed by `0..max_entries`.
pub struct ReuseportArray {
    pub(crate) table: Arc<SlotTable>,
    pub(crate) attr: MapAttr,
    /// Serializes update, delete and free.
    pub(crate) write_lock: Mutex<()>,
    pub(crate) grace: Quiescence,
    pub(crate) state: AtomicU8,
}

impl ReuseportArray {
    /// Create an empty array for `attr`.
    pub fn new(attr: MapAttr) -> Result<Self> {
        Self::with_config(attr, QuiescenceConfig::default())
    }

    /// Create an empty array with explicit grace-period tuning.
    pub fn with_config(attr: MapAttr, config: QuiescenceConfig) -> Result<Self> {
        alloc_check(&attr)?;
        let capacity = usize::try_from(attr.max_entries)
            .map_err(|_| ReuseportError::invalid_attr("max_entries exceeds address space"))?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| ReuseportError::OutOfMemory {
                bytes: attr.memory_footprint(),
            })?;
        slots.extend((0..capacity).map(|_| ArcSwapOption::empty()));

        let table = Arc::new(SlotTable {
            id: RegistryId::next(),
            slots: slots.into_boxed_slice(),
            metrics: ArrayMetrics::new(),
        });
        tracing::debug!(
            target: "reuseport.array",
            registry = table.id.get(),
            max_entries = attr.max_entries,
            value_size = attr.value_size,
            "reuseport array allocated"
        );
        Ok(Self {
            table,
            attr,
            write_lock: Mutex::new(()),
            grace: Quiescence::new(config),
            state: AtomicU8::new(STATE_LIVE),
        })
    }

    #[must_use]
    pub fn registry_id(&self) -> RegistryId {
        self.table.id
    }

    #[must_use]
    pub const fn attr(&self) -> &MapAttr {
        &self.attr
    }

    /// Declared capacity `N`.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.attr.max_entries
    }

    /// Number of occupied slots. Racy by nature; for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .slots
            .iter()
            .filter(|slot| slot.load().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn metrics(&self) -> &ArrayMetrics {
        &self.table.metrics
    }

    /// Grace-period domain guarding teardown.
    #[must_use]
    pub const fn quiescence(&self) -> &Quiescence {
        &self.grace
    }

    /// Whether free has begun.
    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.state.load(Ordering::SeqCst) != STATE_LIVE
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Socket at `index`, or `None` if out of range or empty.
    ///
    /// Takes no lock and never blocks. The slot is read with one atomic
    /// load, so the result is either the occupant before or after any
    /// concurrent mutation, never a mixture.
    #[inline]
    pub fn lookup(&self, index: u32) -> Option<SocketRef<'_>> {
        let section = self.grace.read_lock();
        if self.state.load(Ordering::SeqCst) != STATE_LIVE {
            return None;
        }
        let sk = self.table.slot(index)?.load();
        if sk.is_none() {
            return None;
        }
        Some(SocketRef {
            sk,
            _section: section,
        })
    }

    /// Stable cookie of the socket at `index`.
    ///
    /// Only valid on arrays declared with 8-byte values.
    pub fn lookup_cookie(&self, index: u32) -> Result<u64> {
        if self.attr.value_size != 8 {
            return Err(ReuseportError::ValueSizeMismatch {
                expected: 8,
                actual: self.attr.value_size,
            });
        }
        self.lookup(index)
            .map(|sk| sk.cookie())
            .ok_or(ReuseportError::NoEntry { index })
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Place `sk` in slot `index`.
    ///
    /// Validation runs once without locks to fail fast and again under the
    /// write lock and `sk`'s private lock. Nothing is written unless both
    /// pass. A displaced occupant has its binding cleared after `sk`'s lock
    /// is released but while the write lock is still held, so two socket
    /// locks are never held together and no other update or delete can
    /// rebind the slot in between.
    pub fn update(&self, index: u32, sk: &Arc<Socket>, flags: UpdateFlags) -> Result<()> {
        let result = self.update_inner(index, sk, flags);
        match &result {
            Ok(replaced) => self.table.metrics.record_update(*replaced),
            Err(err) => {
                self.table.metrics.record_update_failure();
                tracing::debug!(
                    target: "reuseport.array",
                    registry = self.table.id.get(),
                    index,
                    sk = sk.serial(),
                    flags = flags.raw(),
                    error = %err,
                    "update rejected"
                );
            }
        }
        result.map(|_| ())
    }

    fn update_inner(&self, index: u32, sk: &Arc<Socket>, flags: UpdateFlags) -> Result<bool> {
        self.ensure_live()?;
        let slot = self.checked_slot(index)?;

        // Quick checks before taking any lock.
        check_update(
            index,
            sk,
            slot.load().is_some(),
            sk.has_user_data(),
            flags,
        )?;

        let write_guard = self.write_lock.lock();
        self.ensure_live()?;

        let mut sk_guard = sk.lock();
        let previous = slot.load_full();
        check_update(
            index,
            sk,
            previous.is_some(),
            sk_guard.is_claimed(),
            flags,
        )?;

        let owner: Weak<dyn SlotRelease> = Arc::downgrade(&self.table) as Weak<dyn SlotRelease>;
        sk_guard.set_binding(ArrayBinding::new(self.table.id, index, owner));
        slot.store(Some(Arc::clone(sk)));
        drop(sk_guard);

        let replaced = previous.is_some();
        if let Some(previous) = previous {
            let cleared = previous.lock().clear_binding_if(self.table.id, index);
            tracing::trace!(
                target: "reuseport.array",
                registry = self.table.id.get(),
                index,
                previous = previous.serial(),
                cleared,
                "previous occupant unbound"
            );
        }
        drop(write_guard);

        tracing::debug!(
            target: "reuseport.array",
            registry = self.table.id.get(),
            index,
            sk = sk.serial(),
            replaced,
            "slot updated"
        );
        Ok(replaced)
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Empty slot `index`, clearing its occupant's binding.
    pub fn delete(&self, index: u32) -> Result<()> {
        self.ensure_live()?;
        let slot = self.checked_slot(index)?;
        if slot.load().is_none() {
            return Err(ReuseportError::NoEntry { index });
        }

        let _write_guard = self.write_lock.lock();
        self.ensure_live()?;
        let Some(sk) = slot.load_full() else {
            return Err(ReuseportError::NoEntry { index });
        };
        {
            let mut sk_guard = sk.lock();
            sk_guard.clear_binding_if(self.table.id, index);
            slot.store(None);
        }

        self.table.metrics.record_delete();
        tracing::debug!(
            target: "reuseport.array",
            registry = self.table.id.get(),
            index,
            sk = sk.serial(),
            "slot deleted"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Next key after `prev` in `0..N`, regardless of occupancy.
    ///
    /// `None` or an out-of-range `prev` restarts at 0; the last index ends
    /// the iteration.
    #[must_use]
    pub fn get_next_key(&self, prev: Option<u32>) -> Option<u32> {
        let max = self.attr.max_entries;
        match prev {
            Some(index) if index < max => {
                if index == max - 1 {
                    None
                } else {
                    Some(index + 1)
                }
            }
            _ => Some(0),
        }
    }

    /// Ascending iterator over every key `0..N`.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::successors(self.get_next_key(None), move |&k| self.get_next_key(Some(k)))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_freed() {
            return Err(ReuseportError::Freed);
        }
        Ok(())
    }

    pub(crate) fn checked_slot(&self, index: u32) -> Result<&ArcSwapOption<Socket>> {
        self.table
            .slot(index)
            .ok_or(ReuseportError::IndexOutOfRange {
                index,
                max_entries: self.attr.max_entries,
            })
    }
}

impl fmt::Debug for ReuseportArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReuseportArray")
            .field("registry", &self.table.id)
            .field("max_entries", &self.attr.max_entries)
            .field("value_size", &self.attr.value_size)
            .field("freed", &self.is_freed())
            .finish_non_exhaustive()
    }
}

/// Update preconditions, shared by the lock-free pre-check and the locked
/// re-check.
fn check_update(
    index: u32,
    sk: &Socket,
    occupied: bool,
    claimed: bool,
    flags: UpdateFlags,
) -> Result<()> {
    if occupied && flags == UpdateFlags::NoExist {
        return Err(ReuseportError::AlreadyExists { index });
    }
    if !occupied && flags == UpdateFlags::Exist {
        return Err(ReuseportError::NoEntry { index });
    }

    let attrs = sk.attrs();
    if !matches!(attrs.protocol, Protocol::Tcp | Protocol::Udp) {
        return Err(ReuseportError::Unsupported {
            attribute: "protocol",
            value: u32::from(attrs.protocol.raw()),
        });
    }
    if !matches!(attrs.family, Family::Inet | Family::Inet6) {
        return Err(ReuseportError::Unsupported {
            attribute: "family",
            value: u32::from(attrs.family.raw()),
        });
    }
    if !matches!(attrs.sock_type, SockType::Stream | SockType::Dgram) {
        return Err(ReuseportError::Unsupported {
            attribute: "type",
            value: u32::from(attrs.sock_type.raw()),
        });
    }
    if !matches!(
        (attrs.protocol, attrs.sock_type),
        (Protocol::Tcp, SockType::Stream) | (Protocol::Udp, SockType::Dgram)
    ) {
        return Err(ReuseportError::Unsupported {
            attribute: "type",
            value: u32::from(attrs.sock_type.raw()),
        });
    }

    let sk_flags = sk.flags();
    if !sk_flags.contains(SockFlags::RCU_FREE) {
        return Err(ReuseportError::NotEligible {
            reason: "socket memory is not reclaimed after a grace period",
        });
    }
    if !sk_flags.contains(SockFlags::HASHED) {
        return Err(ReuseportError::NotEligible {
            reason: "socket is not hashed",
        });
    }
    if sk.reuse_group().is_none() {
        return Err(ReuseportError::NotEligible {
            reason: "socket is not in a reuseport group",
        });
    }

    if claimed {
        return Err(ReuseportError::SocketBusy);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use reuseport_sock::{ForeignData, OwnerTag, ReuseGroupId, SockAttrs};

    use super::*;

    fn array(max_entries: u32) -> ReuseportArray {
        ReuseportArray::new(MapAttr::fd_array(max_entries)).unwrap()
    }

    fn reuseport_socket(attrs: SockAttrs) -> Arc<Socket> {
        Socket::new_reuseport(attrs, ReuseGroupId::next())
    }

    #[test]
    fn update_flags_decode() {
        assert_eq!(UpdateFlags::from_raw(0), Ok(UpdateFlags::Any));
        assert_eq!(UpdateFlags::from_raw(1), Ok(UpdateFlags::NoExist));
        assert_eq!(UpdateFlags::from_raw(2), Ok(UpdateFlags::Exist));
        assert_eq!(
            UpdateFlags::from_raw(3),
            Err(ReuseportError::InvalidFlags { flags: 3 })
        );
        assert_eq!(UpdateFlags::Exist.raw(), 2);
    }

    #[test]
    fn new_array_is_empty() {
        let arr = array(8);
        assert_eq!(arr.capacity(), 8);
        assert!(arr.is_empty());
        for i in 0..8 {
            assert!(arr.lookup(i).is_none());
        }
        assert!(arr.lookup(8).is_none());
        assert!(arr.lookup(u32::MAX).is_none());
    }

    #[test]
    fn update_lookup_delete_round_trip() {
        let arr = array(4);
        let sk = reuseport_socket(SockAttrs::tcp4());

        arr.update(2, &sk, UpdateFlags::NoExist).unwrap();
        let found = arr.lookup(2).unwrap();
        assert!(found.is(&sk));
        drop(found);
        assert_eq!(sk.binding_snapshot(), Some((arr.registry_id(), 2)));
        assert_eq!(arr.len(), 1);

        arr.delete(2).unwrap();
        assert!(arr.lookup(2).is_none());
        assert!(sk.binding_snapshot().is_none());
        assert!(!sk.has_user_data());
    }

    #[test]
    fn existence_flags() {
        let arr = array(4);
        let a = reuseport_socket(SockAttrs::udp4());
        let b = reuseport_socket(SockAttrs::udp4());

        assert_eq!(
            arr.update(0, &a, UpdateFlags::Exist),
            Err(ReuseportError::NoEntry { index: 0 })
        );
        arr.update(0, &a, UpdateFlags::Any).unwrap();
        assert_eq!(
            arr.update(0, &b, UpdateFlags::NoExist),
            Err(ReuseportError::AlreadyExists { index: 0 })
        );
        assert!(arr.lookup(0).unwrap().is(&a));
        assert!(b.binding_snapshot().is_none());

        arr.update(0, &b, UpdateFlags::Exist).unwrap();
        assert!(arr.lookup(0).unwrap().is(&b));
        assert!(a.binding_snapshot().is_none(), "displaced socket unbound");
        assert_eq!(b.binding_snapshot(), Some((arr.registry_id(), 0)));
        assert_eq!(arr.metrics().snapshot().replacements_total, 1);
    }

    #[test]
    fn out_of_range_index() {
        let arr = array(4);
        let sk = reuseport_socket(SockAttrs::tcp6());
        assert_eq!(
            arr.update(4, &sk, UpdateFlags::Any),
            Err(ReuseportError::IndexOutOfRange {
                index: 4,
                max_entries: 4
            })
        );
        assert_eq!(
            arr.delete(9),
            Err(ReuseportError::IndexOutOfRange {
                index: 9,
                max_entries: 4
            })
        );
        assert!(!sk.has_user_data());
    }

    #[test]
    fn unsupported_sockets_are_rejected() {
        let arr = array(2);
        let group = ReuseGroupId::next();
        let sctp = Socket::new_reuseport(
            SockAttrs {
                protocol: Protocol::Other(132),
                ..SockAttrs::tcp4()
            },
            group,
        );
        assert_eq!(
            arr.update(0, &sctp, UpdateFlags::Any),
            Err(ReuseportError::Unsupported {
                attribute: "protocol",
                value: 132
            })
        );

        let unix = Socket::new_reuseport(
            SockAttrs {
                family: Family::Other(1),
                ..SockAttrs::udp4()
            },
            group,
        );
        assert!(matches!(
            arr.update(0, &unix, UpdateFlags::Any),
            Err(ReuseportError::Unsupported {
                attribute: "family",
                ..
            })
        ));

        let raw = Socket::new_reuseport(
            SockAttrs {
                sock_type: SockType::Other(3),
                ..SockAttrs::udp6()
            },
            group,
        );
        assert!(matches!(
            arr.update(0, &raw, UpdateFlags::Any),
            Err(ReuseportError::Unsupported {
                attribute: "type",
                ..
            })
        ));
        assert!(arr.is_empty());
        assert_eq!(arr.metrics().snapshot().update_failures_total, 3);
    }

    #[test]
    fn type_must_match_protocol() {
        let arr = array(2);
        let group = ReuseGroupId::next();
        for attrs in [
            SockAttrs {
                sock_type: SockType::Dgram,
                ..SockAttrs::tcp4()
            },
            SockAttrs {
                sock_type: SockType::Stream,
                ..SockAttrs::udp6()
            },
        ] {
            let sk = Socket::new_reuseport(attrs, group);
            let err = arr.update(0, &sk, UpdateFlags::Any).unwrap_err();
            assert!(
                matches!(
                    err,
                    ReuseportError::Unsupported {
                        attribute: "type",
                        ..
                    }
                ),
                "{attrs:?}"
            );
            assert_eq!(err.errno(), reuseport_error::Errno::NotSupp);
            assert!(!sk.has_user_data());
        }
        assert!(arr.is_empty());
    }

    #[test]
    fn ineligible_sockets_are_rejected() {
        let arr = array(2);

        let unhashed = Socket::new(SockAttrs::tcp4(), SockFlags::RCU_FREE);
        assert!(matches!(
            arr.update(0, &unhashed, UpdateFlags::Any),
            Err(ReuseportError::NotEligible { .. })
        ));

        let no_group = Socket::new(SockAttrs::tcp4(), SockFlags::RCU_FREE);
        no_group.listen(None);
        assert!(matches!(
            arr.update(0, &no_group, UpdateFlags::Any),
            Err(ReuseportError::NotEligible { .. })
        ));

        let eager_free = Socket::new(SockAttrs::tcp4(), SockFlags::empty());
        eager_free.listen(Some(ReuseGroupId::next()));
        assert!(matches!(
            arr.update(0, &eager_free, UpdateFlags::Any),
            Err(ReuseportError::NotEligible { .. })
        ));

        let closed = reuseport_socket(SockAttrs::tcp4());
        closed.close();
        assert!(matches!(
            arr.update(0, &closed, UpdateFlags::Any),
            Err(ReuseportError::NotEligible { .. })
        ));
    }

    #[test]
    fn single_assignment() {
        let arr = array(4);
        let other = array(4);
        let sk = reuseport_socket(SockAttrs::udp4());

        arr.update(1, &sk, UpdateFlags::NoExist).unwrap();
        assert_eq!(
            arr.update(3, &sk, UpdateFlags::NoExist),
            Err(ReuseportError::SocketBusy)
        );
        assert!(arr.lookup(3).is_none());
        assert_eq!(
            other.update(0, &sk, UpdateFlags::Any),
            Err(ReuseportError::SocketBusy)
        );
        assert!(other.lookup(0).is_none());
        // Re-placing the same socket at its own index is also refused.
        assert_eq!(
            arr.update(1, &sk, UpdateFlags::Any),
            Err(ReuseportError::SocketBusy)
        );
    }

    #[test]
    fn foreign_user_data_counts_as_busy() {
        let arr = array(1);
        let sk = reuseport_socket(SockAttrs::tcp4());
        assert!(sk.lock().set_foreign(ForeignData {
            owner: OwnerTag(3),
            token: 1,
        }));
        assert_eq!(
            arr.update(0, &sk, UpdateFlags::Any),
            Err(ReuseportError::SocketBusy)
        );
    }

    #[test]
    fn delete_on_empty_slot_is_idempotent() {
        let arr = array(4);
        assert_eq!(arr.delete(3), Err(ReuseportError::NoEntry { index: 3 }));
        assert_eq!(arr.delete(3), Err(ReuseportError::NoEntry { index: 3 }));
        assert_eq!(arr.metrics().snapshot().deletes_total, 0);
    }

    #[test]
    fn get_next_key_ignores_occupancy() {
        let arr = array(4);
        let sk = reuseport_socket(SockAttrs::tcp4());
        arr.update(2, &sk, UpdateFlags::Any).unwrap();

        assert_eq!(arr.get_next_key(None), Some(0));
        assert_eq!(arr.get_next_key(Some(0)), Some(1));
        assert_eq!(arr.get_next_key(Some(1)), Some(2));
        assert_eq!(arr.get_next_key(Some(2)), Some(3));
        assert_eq!(arr.get_next_key(Some(3)), None);
        assert_eq!(arr.get_next_key(Some(4)), Some(0));
        assert_eq!(arr.get_next_key(Some(u32::MAX)), Some(0));
        assert_eq!(arr.keys().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn lookup_cookie_requires_eight_byte_values() {
        let fd_arr = array(2);
        assert_eq!(
            fd_arr.lookup_cookie(0),
            Err(ReuseportError::ValueSizeMismatch {
                expected: 8,
                actual: 4
            })
        );

        let arr = ReuseportArray::new(MapAttr::cookie_array(2)).unwrap();
        let sk = reuseport_socket(SockAttrs::udp6());
        assert_eq!(arr.lookup_cookie(1), Err(ReuseportError::NoEntry { index: 1 }));
        arr.update(1, &sk, UpdateFlags::Any).unwrap();
        assert_eq!(arr.lookup_cookie(1), Ok(sk.cookie()));
    }

    #[test]
    fn debug_format() {
        let arr = array(3);
        let dbg = format!("{arr:?}");
        assert!(dbg.contains("ReuseportArray"));
        assert!(dbg.contains("max_entries: 3"));

        let sk = reuseport_socket(SockAttrs::tcp4());
        arr.update(0, &sk, UpdateFlags::Any).unwrap();
        let found = arr.lookup(0).unwrap();
        assert!(format!("{found:?}").starts_with("SocketRef"));
    }
}
