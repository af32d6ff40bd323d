//! Per-socket back-reference to the array slot that holds the socket.
//!
//! The socket's extensible user-data field is shared by several subsystems.
//! Ownership is carried explicitly by the [`SkUserData`] variant, so a
//! foreign payload can never be mistaken for an array binding.
//!
//! All accessors live on [`SocketLockGuard`](crate::SocketLockGuard): the
//! binding is only ever read or written while the socket's private lock is
//! held.

use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Socket;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one array instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u64);

impl RegistryId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reuseport-array#{}", self.0)
    }
}

/// Tag naming the subsystem that owns a user-data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerTag(pub u16);

impl OwnerTag {
    /// Reserved for reuseport array bindings.
    pub const REUSEPORT_ARRAY: Self = Self(1);
}

/// Payload stored by some other subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignData {
    pub owner: OwnerTag,
    pub token: u64,
}

/// Slot storage that a bound socket can release on its own teardown path.
///
/// Implementors must not take any lock that ranks above the socket's private
/// lock: the call is made with that lock held.
pub trait SlotRelease: Send + Sync {
    /// Clear slot `index` if it still refers to `sk`. Returns whether the
    /// slot was cleared.
    fn release_slot(&self, index: u32, sk: &Socket) -> bool;
}

/// Binding of a socket to one array slot.
#[derive(Clone)]
pub struct ArrayBinding {
    registry: RegistryId,
    index: u32,
    owner: Weak<dyn SlotRelease>,
}

impl ArrayBinding {
    #[must_use]
    pub fn new(registry: RegistryId, index: u32, owner: Weak<dyn SlotRelease>) -> Self {
        Self {
            registry,
            index,
            owner,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> RegistryId {
        self.registry
    }

    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Whether this binding names `(registry, index)`.
    #[must_use]
    pub fn refers_to(&self, registry: RegistryId, index: u32) -> bool {
        self.registry == registry && self.index == index
    }

    /// Clear the referenced slot if its storage is still alive.
    pub(crate) fn release(&self, sk: &Socket) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.release_slot(self.index, sk))
    }
}

impl fmt::Debug for ArrayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayBinding")
            .field("registry", &self.registry)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ArrayBinding {
    fn eq(&self, other: &Self) -> bool {
        self.refers_to(other.registry, other.index)
    }
}

impl Eq for ArrayBinding {}

/// The socket's extensible user-data field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SkUserData {
    #[default]
    Empty,
    /// Owned by a reuseport array.
    Reuseport(ArrayBinding),
    /// Owned by another subsystem.
    Foreign(ForeignData),
}

impl SkUserData {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Owner of the current payload, if any.
    #[must_use]
    pub const fn owner(&self) -> Option<OwnerTag> {
        match self {
            Self::Empty => None,
            Self::Reuseport(_) => Some(OwnerTag::REUSEPORT_ARRAY),
            Self::Foreign(data) => Some(data.owner),
        }
    }

    /// The array binding, ignoring payloads of other owners.
    #[must_use]
    pub const fn array_binding(&self) -> Option<&ArrayBinding> {
        match self {
            Self::Reuseport(binding) => Some(binding),
            Self::Empty | Self::Foreign(_) => None,
        }
    }
}
