//! Dense packrat memo table
//!
//! Open addressing with linear probing over a flat slot array:
//!
//! 1. **Slots array**: maps hash to entry index (-1 for empty)
//! 2. **Entries array**: small `(offset, key)` records probed on lookup
//! 3. **Results array**: the memoized outcome for each entry, same index
//!
//! Keys are FNV-1a hashed. Probing only touches the compact entries array;
//! the (possibly large) memoized values live in the parallel results array.

use super::cursor::Savepoint;
use super::value::Value;
use serde::{Deserialize, Serialize};

/// Bit marking a key evaluated while failure expectations were inverted
const INVERTED_BIT: u32 = 0x8000_0000;
/// Bit mask for the node identity (lower 31 bits)
const NODE_MASK: u32 = 0x7FFF_FFFF;

/// Memo key: stable node identity plus the failure tracker's inversion flag
///
/// Expressions and rules share one id space; the parser assigns rules the ids
/// following the last expression. The inversion flag is part of the key
/// because the same node records different expectations under a negative
/// lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey(u32);

impl MemoKey {
    /// Create a key
    #[inline]
    pub fn new(node: usize, inverted: bool) -> Self {
        let node = (node as u32) & NODE_MASK;
        if inverted {
            Self(node | INVERTED_BIT)
        } else {
            Self(node)
        }
    }

    /// Node identity
    #[inline]
    pub fn node(&self) -> usize {
        (self.0 & NODE_MASK) as usize
    }

    /// Whether the node was evaluated under inversion
    #[inline]
    pub fn inverted(&self) -> bool {
        self.0 & INVERTED_BIT != 0
    }
}

/// Probe record
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    offset: usize,
    key: MemoKey,
}

/// A memoized evaluation
#[derive(Debug, Clone)]
pub struct Memoized<'g, T> {
    /// Produced value, `None` on failure
    pub outcome: Option<Value<T>>,
    /// Cursor state after the evaluation
    pub end: Savepoint,
    /// Bindings the evaluation wrote into the enclosing frame
    pub bindings: Vec<(&'g str, Value<T>)>,
}

/// Memo table statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStats {
    /// Lookups answered from the table
    pub hits: u64,
    /// Lookups that required evaluation
    pub misses: u64,
    /// Stored entries
    pub entries: usize,
}

impl MemoStats {
    /// Fraction of lookups answered from the table
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Dense memo table keyed by (byte offset, [`MemoKey`])
pub struct MemoTable<'g, T> {
    /// Hash table: maps (hash % capacity) -> entry index, -1 means empty
    slots: Vec<i32>,
    entries: Vec<CacheEntry>,
    results: Vec<Memoized<'g, T>>,
    capacity: usize,
    load_factor: f64,
    hits: u64,
    misses: u64,
}

impl<'g, T> MemoTable<'g, T> {
    /// Create a table with estimated capacity
    pub fn new(estimated_entries: usize) -> Self {
        // Round up to power of 2 for fast modulo
        let capacity = estimated_entries.next_power_of_two().max(16);

        Self {
            slots: vec![-1i32; capacity],
            entries: Vec::with_capacity(estimated_entries),
            results: Vec::with_capacity(estimated_entries),
            capacity,
            load_factor: 0.75,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a table sized for a given input length
    pub fn for_input(input_len: usize, node_count: usize) -> Self {
        // ~1 entry per 10 bytes per node tried at a position; few nodes are
        // tried at any one position, so cap the multiplier
        let estimated = (input_len / 10) * node_count.min(5);
        Self::new(estimated.clamp(256, 500_000))
    }

    /// Look up a memoized evaluation
    pub fn get(&mut self, offset: usize, key: MemoKey) -> Option<&Memoized<'g, T>> {
        match self.find(offset, key) {
            Ok(idx) => {
                self.hits += 1;
                Some(&self.results[idx])
            }
            Err(_) => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store an evaluation, replacing any previous one for the same key
    pub fn insert(&mut self, offset: usize, key: MemoKey, result: Memoized<'g, T>) {
        if let Ok(idx) = self.find(offset, key) {
            self.results[idx] = result;
            return;
        }

        if self.entries.len() as f64 / self.capacity as f64 > self.load_factor {
            self.resize();
        }

        let mut slot = Self::hash(offset, key, self.capacity);
        while self.slots[slot] >= 0 {
            slot = (slot + 1) & (self.capacity - 1);
        }

        let idx = self.entries.len() as i32;
        self.entries.push(CacheEntry { offset, key });
        self.results.push(result);
        self.slots[slot] = idx;
    }

    /// Get table statistics
    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Probe for a key: `Ok(entry index)` or `Err(empty slot)`
    fn find(&self, offset: usize, key: MemoKey) -> Result<usize, usize> {
        let mut slot = Self::hash(offset, key, self.capacity);

        loop {
            let idx = self.slots[slot];
            if idx < 0 {
                return Err(slot);
            }

            let entry = &self.entries[idx as usize];
            if entry.offset == offset && entry.key == key {
                return Ok(idx as usize);
            }

            slot = (slot + 1) & (self.capacity - 1);
        }
    }

    /// Hash function (FNV-1a)
    #[inline]
    fn hash(offset: usize, key: MemoKey, capacity: usize) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        h ^= offset as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
        h ^= key.0 as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
        // Use power-of-2 capacity for fast modulo
        (h as usize) & (capacity - 1)
    }

    fn resize(&mut self) {
        let new_capacity = self.capacity * 2;
        let mut new_slots = vec![-1i32; new_capacity];

        for (idx, entry) in self.entries.iter().enumerate() {
            let mut probe = Self::hash(entry.offset, entry.key, new_capacity);
            while new_slots[probe] >= 0 {
                probe = (probe + 1) & (new_capacity - 1);
            }
            new_slots[probe] = idx as i32;
        }

        self.slots = new_slots;
        self.capacity = new_capacity;
    }
}

impl<T> Default for MemoTable<'_, T> {
    fn default() -> Self {
        Self::new(4096)
    }
}
