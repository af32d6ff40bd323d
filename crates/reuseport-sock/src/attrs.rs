//! Socket attributes consulted by the array's eligibility checks.

use serde::{Deserialize, Serialize};

/// `IPPROTO_TCP`.
pub const IPPROTO_TCP: u8 = 6;
/// `IPPROTO_UDP`.
pub const IPPROTO_UDP: u8 = 17;
/// `AF_INET`.
pub const AF_INET: u16 = 2;
/// `AF_INET6`.
pub const AF_INET6: u16 = 10;
/// `SOCK_STREAM`.
pub const SOCK_STREAM: u16 = 1;
/// `SOCK_DGRAM`.
pub const SOCK_DGRAM: u16 = 2;

/// Transport protocol of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Any other protocol number (SCTP, raw, ...).
    Other(u8),
}

impl Protocol {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            IPPROTO_TCP => Self::Tcp,
            IPPROTO_UDP => Self::Udp,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Tcp => IPPROTO_TCP,
            Self::Udp => IPPROTO_UDP,
            Self::Other(raw) => raw,
        }
    }
}

/// Address family of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    Inet,
    Inet6,
    Other(u16),
}

impl Family {
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            AF_INET => Self::Inet,
            AF_INET6 => Self::Inet6,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        match self {
            Self::Inet => AF_INET,
            Self::Inet6 => AF_INET6,
            Self::Other(raw) => raw,
        }
    }
}

/// Socket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SockType {
    Stream,
    Dgram,
    Other(u16),
}

impl SockType {
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            SOCK_STREAM => Self::Stream,
            SOCK_DGRAM => Self::Dgram,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        match self {
            Self::Stream => SOCK_STREAM,
            Self::Dgram => SOCK_DGRAM,
            Self::Other(raw) => raw,
        }
    }
}

/// Immutable creation-time attributes of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SockAttrs {
    pub family: Family,
    pub protocol: Protocol,
    pub sock_type: SockType,
}

impl SockAttrs {
    /// IPv4 TCP stream socket.
    #[must_use]
    pub const fn tcp4() -> Self {
        Self {
            family: Family::Inet,
            protocol: Protocol::Tcp,
            sock_type: SockType::Stream,
        }
    }

    /// IPv6 TCP stream socket.
    #[must_use]
    pub const fn tcp6() -> Self {
        Self {
            family: Family::Inet6,
            protocol: Protocol::Tcp,
            sock_type: SockType::Stream,
        }
    }

    /// IPv4 UDP datagram socket.
    #[must_use]
    pub const fn udp4() -> Self {
        Self {
            family: Family::Inet,
            protocol: Protocol::Udp,
            sock_type: SockType::Dgram,
        }
    }

    /// IPv6 UDP datagram socket.
    #[must_use]
    pub const fn udp6() -> Self {
        Self {
            family: Family::Inet6,
            protocol: Protocol::Udp,
            sock_type: SockType::Dgram,
        }
    }
}

bitflags::bitflags! {
    /// Runtime state flags of a socket.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SockFlags: u32 {
        /// Memory is reclaimed only after a grace period, so lock-free
        /// readers may keep using the socket after it is unhashed.
        const RCU_FREE = 1;
        /// Socket is in the lookup tables (listening TCP, bound UDP).
        const HASHED = 2;
        /// Socket has been closed by its owner.
        const DEAD = 4;
    }
}
