//! Map-framework entry points: attribute validation, allocation and the
//! byte-oriented element operations.
//!
//! Keys are 4-byte native-endian slot indices. Values are either a 4-byte
//! descriptor or an 8-byte descriptor (which also enables cookie lookup).

use std::mem::size_of;

use arc_swap::ArcSwapOption;
use reuseport_error::{ReuseportError, Result};
use reuseport_sock::{Socket, SocketResolver};
use serde::{Deserialize, Serialize};

use crate::array::{ReuseportArray, UpdateFlags};

/// Width of a key in bytes.
pub const KEY_SIZE: u32 = 4;

/// Largest accepted `max_entries`.
pub const MAX_ENTRIES: u32 = 1 << 24;

const VALUE_SIZE_FD: u32 = 4;
const VALUE_SIZE_COOKIE: u32 = 8;

/// Creation attributes as supplied by the map framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapAttr {
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    #[serde(default)]
    pub map_flags: u32,
}

impl MapAttr {
    /// Attributes for an array whose values are 4-byte descriptors.
    #[must_use]
    pub const fn fd_array(max_entries: u32) -> Self {
        Self {
            key_size: KEY_SIZE,
            value_size: VALUE_SIZE_FD,
            max_entries,
            map_flags: 0,
        }
    }

    /// Attributes for an array with 8-byte values, enabling cookie lookup.
    #[must_use]
    pub const fn cookie_array(max_entries: u32) -> Self {
        Self {
            key_size: KEY_SIZE,
            value_size: VALUE_SIZE_COOKIE,
            max_entries,
            map_flags: 0,
        }
    }

    /// Bytes of memory an array with these attributes occupies.
    #[must_use]
    pub fn memory_footprint(&self) -> u64 {
        let slots = (size_of::<ArcSwapOption<Socket>>() as u64)
            .saturating_mul(u64::from(self.max_entries));
        slots.saturating_add(size_of::<ReuseportArray>() as u64)
    }
}

/// Privilege of the caller creating an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub privileged: bool,
}

impl Credentials {
    pub const PRIVILEGED: Self = Self { privileged: true };
    pub const UNPRIVILEGED: Self = Self { privileged: false };
}

/// Validate creation attributes.
pub fn alloc_check(attr: &MapAttr) -> Result<()> {
    if attr.value_size != VALUE_SIZE_FD && attr.value_size != VALUE_SIZE_COOKIE {
        return Err(ReuseportError::invalid_attr(format!(
            "value_size must be 4 or 8, got {}",
            attr.value_size
        )));
    }
    if attr.key_size != KEY_SIZE {
        return Err(ReuseportError::invalid_attr(format!(
            "key_size must be {KEY_SIZE}, got {}",
            attr.key_size
        )));
    }
    if attr.max_entries == 0 || attr.max_entries > MAX_ENTRIES {
        return Err(ReuseportError::invalid_attr(format!(
            "max_entries must be in 1..={MAX_ENTRIES}, got {}",
            attr.max_entries
        )));
    }
    if attr.map_flags != 0 {
        return Err(ReuseportError::invalid_attr(format!(
            "unsupported map_flags {:#x}",
            attr.map_flags
        )));
    }
    Ok(())
}

/// Create an array. Only privileged callers may do so.
pub fn alloc(attr: &MapAttr, creds: Credentials) -> Result<ReuseportArray> {
    if !creds.privileged {
        return Err(ReuseportError::PermissionDenied);
    }
    ReuseportArray::new(*attr)
}

/// A decoded update value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapValue {
    /// 4-byte descriptor.
    Fd(u32),
    /// 8-byte descriptor.
    WideFd(u64),
}

impl MapValue {
    /// Decode `bytes` for an array declared with `value_size`.
    pub fn from_bytes(bytes: &[u8], value_size: u32) -> Result<Self> {
        let mismatch = || ReuseportError::ValueSizeMismatch {
            expected: value_size,
            actual: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        };
        match value_size {
            VALUE_SIZE_FD => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| mismatch())?;
                Ok(Self::Fd(u32::from_ne_bytes(raw)))
            }
            VALUE_SIZE_COOKIE => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| mismatch())?;
                Ok(Self::WideFd(u64::from_ne_bytes(raw)))
            }
            _ => Err(mismatch()),
        }
    }

    /// The descriptor to resolve.
    ///
    /// A 4-byte value is reinterpreted as signed, so values above
    /// `i32::MAX` come out negative and fail to resolve. An 8-byte value
    /// above `i32::MAX` is rejected outright.
    pub fn fd(self) -> Result<i32> {
        match self {
            Self::Fd(raw) => Ok(i32::from_ne_bytes(raw.to_ne_bytes())),
            Self::WideFd(raw) => {
                i32::try_from(raw).map_err(|_| ReuseportError::InvalidDescriptor { raw })
            }
        }
    }
}

/// Decode a 4-byte key.
pub fn decode_key(key: &[u8]) -> Result<u32> {
    let raw: [u8; 4] = key.try_into().map_err(|_| ReuseportError::KeySizeMismatch {
        expected: KEY_SIZE,
        actual: u32::try_from(key.len()).unwrap_or(u32::MAX),
    })?;
    Ok(u32::from_ne_bytes(raw))
}

impl ReuseportArray {
    /// Update from raw key and value bytes, resolving the descriptor through
    /// `resolver`.
    pub fn update_elem<R>(&self, resolver: &R, key: &[u8], value: &[u8], flags: u64) -> Result<()>
    where
        R: SocketResolver + ?Sized,
    {
        let flags = UpdateFlags::from_raw(flags)?;
        let index = decode_key(key)?;
        self.checked_slot(index)?;
        let fd = MapValue::from_bytes(value, self.attr.value_size)?.fd()?;
        let sk = resolver.resolve(fd)?;
        self.update(index, &sk, flags)
    }

    /// Write the cookie of the socket at `key` into `value_out`.
    pub fn lookup_elem_cookie(&self, key: &[u8], value_out: &mut [u8]) -> Result<()> {
        let index = decode_key(key)?;
        let cookie = self.lookup_cookie(index)?;
        let actual = u32::try_from(value_out.len()).unwrap_or(u32::MAX);
        let out: &mut [u8; 8] = value_out
            .try_into()
            .map_err(|_| ReuseportError::ValueSizeMismatch {
                expected: VALUE_SIZE_COOKIE,
                actual,
            })?;
        *out = cookie.to_ne_bytes();
        Ok(())
    }

    /// Delete by raw key bytes.
    pub fn delete_elem(&self, key: &[u8]) -> Result<()> {
        self.delete(decode_key(key)?)
    }

    /// Write the key following `key` (or the first key when `None`) into
    /// `next_out`. The last key yields [`ReuseportError::NoEntry`].
    pub fn get_next_key_elem(&self, key: Option<&[u8]>, next_out: &mut [u8]) -> Result<()> {
        let prev = key.map(decode_key).transpose()?;
        let actual = u32::try_from(next_out.len()).unwrap_or(u32::MAX);
        let out: &mut [u8; 4] = next_out
            .try_into()
            .map_err(|_| ReuseportError::KeySizeMismatch {
                expected: KEY_SIZE,
                actual,
            })?;
        let next = self
            .get_next_key(prev)
            .ok_or(ReuseportError::NoEntry {
                index: prev.unwrap_or_default(),
            })?;
        *out = next.to_ne_bytes();
        Ok(())
    }
}
