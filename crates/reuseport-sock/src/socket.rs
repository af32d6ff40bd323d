//! The socket entity as seen by the reuseport array.
//!
//! A [`Socket`] is owned and reference-managed by its own subsystem through
//! `Arc`. The array only ever holds a revocable reference that is dropped on
//! delete, detach or free.
//!
//! ## Locking
//!
//! Each socket has one private lock (the callback lock) guarding its
//! user-data field. [`Socket::lock`] returns a [`SocketLockGuard`], the only
//! path to the binding accessors. The lock ranks below the array's write
//! lock: take the array lock first, never the reverse, and never hold two
//! sockets' private locks at once.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::attrs::{SockAttrs, SockFlags};
use crate::binding::{ArrayBinding, ForeignData, OwnerTag, RegistryId, SkUserData};

static NEXT_SOCKET_SERIAL: AtomicU64 = AtomicU64::new(1);
static NEXT_COOKIE: AtomicU64 = AtomicU64::new(1);
static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a port-sharing (`SO_REUSEPORT`) group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReuseGroupId(NonZeroU64);

impl ReuseGroupId {
    /// Allocate a fresh group identity.
    #[must_use]
    pub fn next() -> Self {
        let raw = NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// A network socket.
pub struct Socket {
    serial: u64,
    attrs: SockAttrs,
    flags: AtomicU32,
    /// 0 = not in a reuseport group.
    reuse_group: AtomicU64,
    /// 0 = not generated yet.
    cookie: AtomicU64,
    /// Lock-free mirror of `!user_data.is_empty()`.
    user_data_set: AtomicBool,
    callback_lock: RwLock<SkUserData>,
}

impl Socket {
    /// Create a socket with the given attributes and initial flags.
    #[must_use]
    pub fn new(attrs: SockAttrs, flags: SockFlags) -> Arc<Self> {
        Arc::new(Self {
            serial: NEXT_SOCKET_SERIAL.fetch_add(1, Ordering::Relaxed),
            attrs,
            flags: AtomicU32::new(flags.bits()),
            reuse_group: AtomicU64::new(0),
            cookie: AtomicU64::new(0),
            user_data_set: AtomicBool::new(false),
            callback_lock: RwLock::new(SkUserData::Empty),
        })
    }

    /// Create a hashed socket already in `group`: the state a listening TCP
    /// or bound UDP socket reaches after `SO_REUSEPORT` + bind/listen.
    #[must_use]
    pub fn new_reuseport(attrs: SockAttrs, group: ReuseGroupId) -> Arc<Self> {
        let sk = Self::new(attrs, SockFlags::RCU_FREE);
        sk.listen(Some(group));
        sk
    }

    /// Process-local serial number (diagnostics only).
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    #[must_use]
    pub const fn attrs(&self) -> SockAttrs {
        self.attrs
    }

    #[must_use]
    pub fn flags(&self) -> SockFlags {
        SockFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.flags().contains(SockFlags::HASHED)
    }

    /// Current reuseport group, if any.
    #[must_use]
    pub fn reuse_group(&self) -> Option<ReuseGroupId> {
        NonZeroU64::new(self.reuse_group.load(Ordering::Acquire)).map(ReuseGroupId)
    }

    /// Hashed, reclaimed after a grace period, and in a reuseport group.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        let flags = self.flags();
        flags.contains(SockFlags::RCU_FREE | SockFlags::HASHED) && self.reuse_group().is_some()
    }

    /// Stable export identifier. Generated on first use, never 0.
    pub fn cookie(&self) -> u64 {
        let current = self.cookie.load(Ordering::Acquire);
        if current != 0 {
            return current;
        }
        let fresh = NEXT_COOKIE.fetch_add(1, Ordering::Relaxed);
        match self
            .cookie
            .compare_exchange(0, fresh, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => fresh,
            Err(winner) => winner,
        }
    }

    /// Lock-free peek at whether the user-data field holds anything.
    ///
    /// May be stale by the time the caller acts on it; authoritative checks
    /// must go through [`Socket::lock`].
    #[must_use]
    pub fn has_user_data(&self) -> bool {
        self.user_data_set.load(Ordering::Acquire)
    }

    /// Take the socket's private lock.
    pub fn lock(&self) -> SocketLockGuard<'_> {
        SocketLockGuard {
            sk: self,
            data: self.callback_lock.write(),
        }
    }

    /// Array binding snapshot taken under the private lock.
    #[must_use]
    pub fn binding_snapshot(&self) -> Option<(RegistryId, u32)> {
        self.callback_lock
            .read()
            .array_binding()
            .map(|b| (b.registry(), b.index()))
    }

    /// Enter the lookup tables, optionally joining a reuseport group.
    pub fn listen(&self, group: Option<ReuseGroupId>) {
        if let Some(group) = group {
            self.reuse_group.store(group.get(), Ordering::Release);
        }
        self.set_flags(SockFlags::HASHED);
        tracing::trace!(
            target: "reuseport.sock",
            sk = self.serial,
            group = group.map(ReuseGroupId::get),
            "socket hashed"
        );
    }

    /// Detach from any array slot, leave the reuseport group and unhash.
    ///
    /// This is the path taken by `close()` and `disconnect()`; it holds only
    /// this socket's private lock while touching the array.
    pub fn unhash(&self) {
        let detached = self.detach_reuseport();
        self.reuse_group.store(0, Ordering::Release);
        self.clear_flags(SockFlags::HASHED);
        tracing::trace!(
            target: "reuseport.sock",
            sk = self.serial,
            detached,
            "socket unhashed"
        );
    }

    /// Disconnect the socket (`connect(AF_UNSPEC)` on UDP).
    pub fn disconnect(&self) {
        self.unhash();
    }

    /// Close the socket. Further use through the array is not possible.
    pub fn close(&self) {
        self.unhash();
        self.set_flags(SockFlags::DEAD);
    }

    /// Remove this socket from whatever array slot it is bound to.
    ///
    /// Clears the binding and the slot under this socket's private lock,
    /// without the array's write lock. Returns whether a binding was found.
    pub fn detach_reuseport(&self) -> bool {
        let mut guard = self.lock();
        let Some(binding) = guard.clear_binding() else {
            return false;
        };
        let released = binding.release(self);
        tracing::trace!(
            target: "reuseport.sock",
            sk = self.serial,
            registry = binding.registry().get(),
            index = binding.index(),
            released,
            "reuseport binding detached"
        );
        true
    }

    fn set_flags(&self, flags: SockFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    fn clear_flags(&self, flags: SockFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("serial", &self.serial)
            .field("attrs", &self.attrs)
            .field("flags", &self.flags())
            .field("reuse_group", &self.reuse_group())
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a socket's private lock.
///
/// Provides the binding operations `get` / `set` / `clear`.
pub struct SocketLockGuard<'a> {
    sk: &'a Socket,
    data: RwLockWriteGuard<'a, SkUserData>,
}

impl SocketLockGuard<'_> {
    /// The locked socket.
    #[must_use]
    pub fn socket(&self) -> &Socket {
        self.sk
    }

    /// Raw user-data field.
    #[must_use]
    pub fn user_data(&self) -> &SkUserData {
        &self.data
    }

    /// Whether any subsystem has claimed the user-data field.
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        !self.data.is_empty()
    }

    /// Current array binding.
    #[must_use]
    pub fn binding(&self) -> Option<&ArrayBinding> {
        self.data.array_binding()
    }

    /// Record `binding`. Overwrites only an empty field or an older array
    /// binding; a foreign payload is left alone and `false` is returned.
    pub fn set_binding(&mut self, binding: ArrayBinding) -> bool {
        if matches!(*self.data, SkUserData::Foreign(_)) {
            return false;
        }
        *self.data = SkUserData::Reuseport(binding);
        self.sync_mirror();
        true
    }

    /// Remove and return the array binding. Foreign payloads are untouched.
    pub fn clear_binding(&mut self) -> Option<ArrayBinding> {
        if !matches!(*self.data, SkUserData::Reuseport(_)) {
            return None;
        }
        let SkUserData::Reuseport(binding) = std::mem::take(&mut *self.data) else {
            return None;
        };
        self.sync_mirror();
        Some(binding)
    }

    /// Clear the binding only if it still names `(registry, index)`.
    pub fn clear_binding_if(&mut self, registry: RegistryId, index: u32) -> bool {
        let matches = self
            .data
            .array_binding()
            .is_some_and(|b| b.refers_to(registry, index));
        if matches {
            *self.data = SkUserData::Empty;
            self.sync_mirror();
        }
        matches
    }

    /// Claim the field for another subsystem. Fails if already claimed or
    /// if `data` carries the array's reserved owner tag.
    pub fn set_foreign(&mut self, data: ForeignData) -> bool {
        if self.is_claimed() || data.owner == OwnerTag::REUSEPORT_ARRAY {
            return false;
        }
        *self.data = SkUserData::Foreign(data);
        self.sync_mirror();
        true
    }

    /// Release a foreign claim made with [`set_foreign`](Self::set_foreign).
    pub fn clear_foreign(&mut self) -> Option<ForeignData> {
        let SkUserData::Foreign(data) = *self.data else {
            return None;
        };
        *self.data = SkUserData::Empty;
        self.sync_mirror();
        Some(data)
    }

    fn sync_mirror(&self) {
        self.sk
            .user_data_set
            .store(!self.data.is_empty(), Ordering::Release);
    }
}
