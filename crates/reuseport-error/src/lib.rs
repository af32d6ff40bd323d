use thiserror::Error;

/// Primary error type for reuseport socket array operations.
///
/// Every variant is produced strictly before any slot or binding write, so a
/// failed call never leaves a partial state change behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReuseportError {
    // === Validation Errors ===
    /// Existence flags outside `ANY | NOEXIST | EXIST`.
    #[error("invalid update flags: {flags:#x}")]
    InvalidFlags { flags: u64 },

    /// Map attributes rejected before allocation.
    #[error("invalid map attribute: {detail}")]
    InvalidAttr { detail: String },

    /// An 8-byte value that cannot name a descriptor.
    #[error("invalid socket descriptor value: {raw}")]
    InvalidDescriptor { raw: u64 },

    /// Socket protocol, family or type is not one the array accepts.
    #[error("unsupported socket {attribute}: {value}")]
    Unsupported { attribute: &'static str, value: u32 },

    /// Socket is not hashed, not in a reuseport group, or not freed lazily.
    #[error("socket is not eligible: {reason}")]
    NotEligible { reason: &'static str },

    /// Caller's declared value width does not match the operation.
    #[error("value size mismatch: expected {expected} bytes, got {actual}")]
    ValueSizeMismatch { expected: u32, actual: u32 },

    /// Key bytes of the wrong width.
    #[error("key size mismatch: expected {expected} bytes, got {actual}")]
    KeySizeMismatch { expected: u32, actual: u32 },

    /// Descriptor does not resolve to a socket.
    #[error("bad socket descriptor: {fd}")]
    BadDescriptor { fd: i32 },

    /// Array has been freed; no further operations are valid.
    #[error("reuseport array has been freed")]
    Freed,

    // === Capacity Errors ===
    /// Index outside `0..max_entries`.
    #[error("index {index} out of range (max_entries {max_entries})")]
    IndexOutOfRange { index: u32, max_entries: u32 },

    // === Conflict Errors ===
    /// `NOEXIST` update on an occupied slot.
    #[error("slot {index} already occupied")]
    AlreadyExists { index: u32 },

    /// `EXIST` update or delete on an empty slot, or lookup miss.
    #[error("slot {index} is empty")]
    NoEntry { index: u32 },

    /// Selected socket belongs to a different reuseport group.
    #[error("socket at slot {index} belongs to another reuseport group")]
    GroupMismatch { index: u32 },

    // === Busy ===
    /// Candidate socket already carries a binding (single-assignment rule).
    #[error("socket is already bound")]
    SocketBusy,

    // === Resource Errors ===
    /// Caller lacks the privilege to create the array.
    #[error("operation not permitted")]
    PermissionDenied,

    /// Slot storage could not be reserved.
    #[error("out of memory reserving {bytes} bytes")]
    OutOfMemory { bytes: u64 },
}

/// Linux errno values for wire compatibility with the map syscall surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Errno {
    /// Operation not permitted.
    Perm = 1,
    /// No such entry.
    NoEnt = 2,
    /// Argument list too long; reused for out-of-range keys.
    TooBig = 7,
    /// Bad file descriptor.
    BadF = 9,
    /// Out of memory.
    NoMem = 12,
    /// Device or resource busy.
    Busy = 16,
    /// Entry exists.
    Exist = 17,
    /// Cross-device link; reused for reuseport group mismatch.
    XDev = 18,
    /// Invalid argument.
    Inval = 22,
    /// No space left; reused for value width mismatch.
    NoSpc = 28,
    /// Operation not supported (kernel-internal code).
    NotSupp = 524,
}

/// Coarse failure classes used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed request; nothing was attempted.
    Validation,
    /// Existence flags disagree with slot occupancy.
    Conflict,
    /// Candidate socket is owned elsewhere.
    ResourceBusy,
    /// Index outside the declared bound.
    Capacity,
    /// Privilege or memory shortage.
    Resource,
}

impl ReuseportError {
    /// Map this error to its errno.
    #[allow(clippy::match_same_arms)]
    pub const fn errno(&self) -> Errno {
        match self {
            Self::InvalidFlags { .. }
            | Self::InvalidAttr { .. }
            | Self::InvalidDescriptor { .. }
            | Self::NotEligible { .. }
            | Self::KeySizeMismatch { .. } => Errno::Inval,
            Self::Unsupported { .. } => Errno::NotSupp,
            Self::ValueSizeMismatch { .. } => Errno::NoSpc,
            Self::BadDescriptor { .. } | Self::Freed => Errno::BadF,
            Self::IndexOutOfRange { .. } => Errno::TooBig,
            Self::AlreadyExists { .. } => Errno::Exist,
            Self::NoEntry { .. } => Errno::NoEnt,
            Self::GroupMismatch { .. } => Errno::XDev,
            Self::SocketBusy => Errno::Busy,
            Self::PermissionDenied => Errno::Perm,
            Self::OutOfMemory { .. } => Errno::NoMem,
        }
    }

    /// Failure class of this error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidFlags { .. }
            | Self::InvalidAttr { .. }
            | Self::InvalidDescriptor { .. }
            | Self::Unsupported { .. }
            | Self::NotEligible { .. }
            | Self::ValueSizeMismatch { .. }
            | Self::KeySizeMismatch { .. }
            | Self::BadDescriptor { .. }
            | Self::Freed => ErrorClass::Validation,
            Self::IndexOutOfRange { .. } => ErrorClass::Capacity,
            Self::AlreadyExists { .. } | Self::NoEntry { .. } | Self::GroupMismatch { .. } => {
                ErrorClass::Conflict
            }
            Self::SocketBusy => ErrorClass::ResourceBusy,
            Self::PermissionDenied | Self::OutOfMemory { .. } => ErrorClass::Resource,
        }
    }

    /// Whether this is an ordinary miss rather than a fault.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoEntry { .. })
    }

    /// Negative errno as returned across the syscall boundary.
    pub const fn to_syscall_ret(&self) -> i32 {
        -(self.errno() as i32)
    }

    /// Create an attribute validation error.
    pub fn invalid_attr(detail: impl Into<String>) -> Self {
        Self::InvalidAttr {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `ReuseportError`.
pub type Result<T> = std::result::Result<T, ReuseportError>;
