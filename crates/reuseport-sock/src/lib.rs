//! Socket model for the reuseport socket array.
//!
//! Provides the pieces of the socket subsystem the array depends on:
//! creation-time attributes, eligibility state, the stable cookie, the
//! private callback lock with its tagged user-data field, and the
//! close/disconnect paths that detach a socket from its array slot.

pub mod attrs;
pub mod binding;
pub mod socket;
pub mod table;

pub use attrs::{
    AF_INET, AF_INET6, Family, IPPROTO_TCP, IPPROTO_UDP, Protocol, SOCK_DGRAM, SOCK_STREAM,
    SockAttrs, SockFlags, SockType,
};
pub use binding::{ArrayBinding, ForeignData, OwnerTag, RegistryId, SkUserData, SlotRelease};
pub use socket::{ReuseGroupId, Socket, SocketLockGuard};
pub use table::{SocketResolver, SocketTable};
