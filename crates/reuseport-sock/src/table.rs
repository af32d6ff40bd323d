//! Descriptor table: resolves integer descriptors to sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;
use reuseport_error::{ReuseportError, Result};

use crate::Socket;

/// First descriptor handed out; 0..=2 are the standard streams.
const FIRST_FD: i32 = 3;

/// Resolution of a descriptor to a socket handle.
pub trait SocketResolver {
    /// Resolve `fd`. The returned handle keeps the socket alive for the
    /// duration of the caller's operation.
    fn resolve(&self, fd: i32) -> Result<Arc<Socket>>;
}

/// In-process descriptor table.
#[derive(Debug)]
pub struct SocketTable {
    next_fd: AtomicI32,
    entries: RwLock<HashMap<i32, Arc<Socket>>>,
}

impl SocketTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_fd: AtomicI32::new(FIRST_FD),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Install `sk` and return its descriptor.
    pub fn install(&self, sk: Arc<Socket>) -> i32 {
        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(fd, sk);
        fd
    }

    /// Drop the table's reference to `fd` and close the socket if this was
    /// its last descriptor.
    pub fn close(&self, fd: i32) -> Result<()> {
        let sk = self
            .entries
            .write()
            .remove(&fd)
            .ok_or(ReuseportError::BadDescriptor { fd })?;
        let still_open = self
            .entries
            .read()
            .values()
            .any(|other| Arc::ptr_eq(other, &sk));
        if !still_open {
            sk.close();
        }
        Ok(())
    }

    /// Number of installed descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SocketTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketResolver for SocketTable {
    fn resolve(&self, fd: i32) -> Result<Arc<Socket>> {
        if fd < 0 {
            return Err(ReuseportError::BadDescriptor { fd });
        }
        self.entries
            .read()
            .get(&fd)
            .cloned()
            .ok_or(ReuseportError::BadDescriptor { fd })
    }
}
