//! Fixed-capacity socket array for `SO_REUSEPORT` dispatch.
//!
//! Control-plane code places sockets into slots with [`ReuseportArray::update`];
//! the dispatch path reads them with [`ReuseportArray::lookup`] without taking
//! any lock. A socket occupies at most one slot in at most one array, and
//! closing it removes it from that slot.

pub mod array;
pub mod grace;
pub mod lifecycle;
pub mod map;
pub mod metrics;
pub mod select;

pub use array::{ReuseportArray, SocketRef, UpdateFlags};
pub use grace::{
    DEFAULT_SPIN_BEFORE_YIELD, DEFAULT_WARN_AFTER, GraceMetrics, Quiescence, QuiescenceConfig,
    ReadSection, grace_metrics, reset_grace_metrics,
};
pub use lifecycle::detach;
pub use map::{
    Credentials, KEY_SIZE, MAX_ENTRIES, MapAttr, MapValue, alloc, alloc_check, decode_key,
};
pub use metrics::{ArrayMetrics, ArrayMetricsSnapshot};
pub use select::select_socket;

pub use reuseport_error::{Errno, ErrorClass, ReuseportError, Result};
pub use reuseport_sock as sock;
