//! The 256-entry caches URP keeps for types, OIDs and TIDs.
//!
//! Each side of a connection keeps its own view: the sending side decides
//! which slot a value goes into and tells the peer, the receiving side just
//! stores whatever it is told. A cache index of `0xFFFF` means "do not cache".

use crate::error::{Result, UrpError};

/// Number of slots in every second-level cache.
pub const CACHE_SIZE: usize = 256;

/// Wire marker for "no cache slot".
pub const NO_CACHE: u16 = 0xFFFF;

/// Receiving-side cache: slots are filled at the indices the peer chooses.
#[derive(Debug)]
pub struct InboundCache<T> {
    slots: [Option<T>; CACHE_SIZE],
}

impl<T: Clone> InboundCache<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Remember `value` at `index`. `NO_CACHE` is accepted and ignored.
    pub fn store(&mut self, index: u16, value: T) -> Result<()> {
        if index == NO_CACHE {
            return Ok(());
        }
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or_else(|| UrpError::Cache(format!("cache index {index} out of range")))?;
        *slot = Some(value);
        Ok(())
    }

    /// Fetch the value the peer previously stored at `index`.
    pub fn lookup(&self, index: u16, what: &str) -> Result<T> {
        self.slots
            .get(index as usize)
            .and_then(Option::clone)
            .ok_or_else(|| UrpError::Cache(format!("{what} cache miss at index {index}")))
    }
}

impl<T: Clone> Default for InboundCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending-side cache with round-robin eviction.
///
/// Mirrors what the peer's [`InboundCache`] holds, so a value that is already
/// cached can be sent as a bare index.
#[derive(Debug)]
pub struct OutboundCache<T> {
    slots: [Option<T>; CACHE_SIZE],
    next: usize,
}

impl<T: Clone + PartialEq> OutboundCache<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            next: 0,
        }
    }

    /// Returns `(index, is_new)`. A new value takes the next slot in
    /// round-robin order and must be sent in full together with the index.
    pub fn intern(&mut self, value: &T) -> (u16, bool) {
        if let Some(index) = self.position(value) {
            return (index, false);
        }
        let index = self.next;
        self.slots[index] = Some(value.clone());
        self.next = (self.next + 1) % CACHE_SIZE;
        (index as u16, true)
    }

    pub fn position(&self, value: &T) -> Option<u16> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref() == Some(value))
            .map(|i| i as u16)
    }
}

impl<T: Clone + PartialEq> Default for OutboundCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
