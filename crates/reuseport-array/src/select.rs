//! Dispatch-time socket selection.
//!
//! A steering program picks an index; the packet's own reuseport group
//! decides whether the occupant may receive it. Never blocks and never
//! logs.

use reuseport_error::{ReuseportError, Result};
use reuseport_sock::ReuseGroupId;

use crate::array::{ReuseportArray, SocketRef};

/// Select the socket at `index` for a packet arriving on `group`.
///
/// An empty slot, or an occupant that has already left its group (it is
/// being closed), yields [`ReuseportError::NoEntry`]. An occupant from a
/// different group yields [`ReuseportError::GroupMismatch`].
#[inline]
pub fn select_socket(
    array: &ReuseportArray,
    index: u32,
    group: ReuseGroupId,
) -> Result<SocketRef<'_>> {
    let sk = array.lookup(index).ok_or(ReuseportError::NoEntry { index })?;
    match sk.reuse_group() {
        None => Err(ReuseportError::NoEntry { index }),
        Some(current) if current != group => Err(ReuseportError::GroupMismatch { index }),
        Some(_) => Ok(sk),
    }
}
