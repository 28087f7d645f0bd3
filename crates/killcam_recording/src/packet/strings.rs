//! Deduplicating string cache.
//!
//! Packets refer to names by offset. Each entry is laid out as
//! `[len:u16 LE][bytes][0]` inside one fixed-capacity region.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{RecordingError, RecordingResult};

/// Which cache an entry belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Sound names
    Sound,
    /// Model, effect and socket names
    Model,
}

/// Offset of an entry in a [`StringCache`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringRef(pub u16);

impl StringRef {
    /// Wire value for "no string"
    pub const NONE_RAW: u16 = u16::MAX;

    /// Converts an optional reference to its wire value
    #[must_use]
    #[inline]
    pub const fn to_raw(value: Option<Self>) -> u16 {
        match value {
            Some(r) => r.0,
            None => Self::NONE_RAW,
        }
    }

    /// Converts a wire value back to an optional reference
    #[must_use]
    #[inline]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw == Self::NONE_RAW {
            None
        } else {
            Some(Self(raw))
        }
    }
}

const ENTRY_OVERHEAD: usize = 3;

/// Fixed-capacity deduplicating string store
#[derive(Debug, Clone)]
pub struct StringCache {
    kind: CacheKind,
    capacity: usize,
    bytes: Vec<u8>,
    index: HashMap<String, StringRef>,
}

impl StringCache {
    /// Creates an empty cache. Capacity is clamped to what a [`StringRef`] can address.
    #[must_use]
    pub fn new(kind: CacheKind, capacity: usize) -> Self {
        let capacity = capacity.min(usize::from(StringRef::NONE_RAW));
        Self { kind, capacity, bytes: Vec::with_capacity(capacity), index: HashMap::new() }
    }

    /// Cache kind
    #[must_use]
    pub const fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Bytes in use
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Region capacity in bytes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the offset of `name`, appending it when not yet cached.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::StringCacheFull`] when the entry does not fit.
    pub fn try_cache(&mut self, name: &str) -> RecordingResult<StringRef> {
        if let Some(existing) = self.index.get(name) {
            return Ok(*existing);
        }
        let full = RecordingError::StringCacheFull {
            kind: self.kind,
            used: self.bytes.len(),
            capacity: self.capacity,
        };
        let Ok(len) = u16::try_from(name.len()) else {
            return Err(full);
        };
        if self.bytes.len() + name.len() + ENTRY_OVERHEAD > self.capacity {
            return Err(full);
        }
        let offset = StringRef(u16::try_from(self.bytes.len()).map_err(|_| full)?);
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        self.index.insert(name.to_owned(), offset);
        Ok(offset)
    }

    /// Like [`StringCache::try_cache`], logging and returning `None` when full
    pub fn cache(&mut self, name: &str) -> Option<StringRef> {
        match self.try_cache(name) {
            Ok(offset) => Some(offset),
            Err(err) => {
                warn!(%err, name, "string not cached");
                None
            }
        }
    }

    /// Looks up the string stored at `offset`
    #[must_use]
    pub fn resolve(&self, offset: StringRef) -> Option<&str> {
        let start = usize::from(offset.0);
        let header = self.bytes.get(start..start + 2)?;
        let len = usize::from(u16::from_le_bytes([header[0], header[1]]));
        let body = self.bytes.get(start + 2..start + 2 + len)?;
        std::str::from_utf8(body).ok()
    }

    /// Drops every entry. Outstanding [`StringRef`]s become dangling.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.index.clear();
    }
}
