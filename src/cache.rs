//! Bounded per-device cache of undelivered documents.
//!
//! The cache holds at most one document per device and at most
//! [`CACHE_CAPACITY`] devices. Slots are filled lowest index first. When every
//! slot holds a different device, a new device overwrites slot 0 regardless of
//! how recently that slot was updated.

use crate::mac_address::MacAddress;
use log::warn;
use std::collections::{BTreeSet, HashMap};

/// Number of devices the cache can hold.
pub const CACHE_CAPACITY: usize = 16;

/// Slot overwritten when the cache is full.
const EVICTION_SLOT: usize = 0;

/// A cached document for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub address: MacAddress,
    pub payload: String,
}

/// Fixed-capacity store of the latest document per device.
#[derive(Debug)]
pub struct DeviceCache {
    slots: Vec<Option<CacheEntry>>,
    /// Address -> slot index for occupied slots
    index: HashMap<MacAddress, usize>,
    /// Unoccupied slot indexes, lowest first
    free: BTreeSet<usize>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    /// Create a cache with a custom number of slots.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
            index: HashMap::with_capacity(capacity),
            free: (0..capacity).collect(),
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cached document for `address`, if any.
    #[cfg(test)]
    pub(crate) fn get(&self, address: &MacAddress) -> Option<&str> {
        let slot = *self.index.get(address)?;
        self.slots[slot].as_ref().map(|entry| entry.payload.as_str())
    }

    /// Slot currently holding `address`.
    #[cfg(test)]
    pub(crate) fn slot_of(&self, address: &MacAddress) -> Option<usize> {
        self.index.get(address).copied()
    }

    /// Occupied entries in slot order.
    #[cfg(test)]
    pub(crate) fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.slots.iter().flatten()
    }

    /// Store `payload` as the latest document for `address`.
    ///
    /// Returns the address that was evicted to make room, if any.
    pub fn upsert(&mut self, address: MacAddress, payload: String) -> Option<MacAddress> {
        if let Some(&slot) = self.index.get(&address) {
            self.slots[slot] = Some(CacheEntry { address, payload });
            return None;
        }

        if let Some(slot) = self.free.pop_first() {
            self.index.insert(address, slot);
            self.slots[slot] = Some(CacheEntry { address, payload });
            return None;
        }

        let evicted = self.slots[EVICTION_SLOT]
            .replace(CacheEntry { address, payload })
            .map(|old| old.address);
        if let Some(old) = evicted {
            self.index.remove(&old);
            warn!("Device cache full, evicting {old} from slot {EVICTION_SLOT} for {address}");
        }
        self.index.insert(address, EVICTION_SLOT);
        evicted
    }

    /// Offer every entry to `deliver` in slot order, clearing those it accepts.
    ///
    /// Entries for which `deliver` returns `false` stay cached. Returns the
    /// number of cleared entries.
    pub fn drain_accepted<F>(&mut self, mut deliver: F) -> usize
    where
        F: FnMut(&MacAddress, &str) -> bool,
    {
        let mut cleared = 0;
        for (slot, cell) in self.slots.iter_mut().enumerate() {
            let accepted = match cell {
                Some(entry) => deliver(&entry.address, &entry.payload),
                None => continue,
            };
            if accepted && let Some(entry) = cell.take() {
                self.index.remove(&entry.address);
                self.free.insert(slot);
                cleared += 1;
            }
        }
        cleared
    }

    /// Remove and return every entry in slot order.
    pub fn flush_all(&mut self) -> Vec<(MacAddress, String)> {
        let mut drained = Vec::with_capacity(self.len());
        for (slot, cell) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = cell.take() {
                self.index.remove(&entry.address);
                self.free.insert(slot);
                drained.push((entry.address, entry.payload));
            }
        }
        drained
    }
}

impl Default for DeviceCache {
    fn default() -> Self {
        Self::new()
    }
}
