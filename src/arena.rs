//! Arena allocators.
//!
//! Three append-only heaps whose lifetime is the node: **general**
//! (metadata, cards, components, chassis, setters), **card stateful** (IO
//! register state), and **HA stateful** (virtual points, component
//! stateful points, logic-chain internal points). A C-style
//! implementation would make these literal contiguous-memory bump
//! allocators returning raw pointers, since objects of wildly different
//! concrete types are packed into one buffer.
//!
//! Rust's ownership model already gives every object here exactly the
//! lifetime each wants — tied to whatever owns it transitively from
//! `Node` — without needing a raw-pointer bump allocator, and a safe
//! generic `Arena<T>` can't hold heterogeneous concrete types in one
//! instance anyway. So `Arena` here is a *budget*: it tracks how many bytes
//! a caller-declared capacity allows, and `try_alloc` accounts a
//! construction against that budget and fails with an out-of-memory
//! `FxtError` once it's exhausted — the same observable behavior (a
//! configured memory ceiling the build can blow through) without the
//! unsafe plumbing a byte-oriented bump allocator would need. Real storage
//! for accounted objects is ordinary `Box`/`Vec` ownership; nothing is ever
//! freed individually, and `reset_all` (called once, at node drop) is the
//! only way the budget counters move backwards.

use crate::error::FxtError;

/// One named, capacity-bounded heap.
#[derive(Debug)]
pub struct Arena {
    name: &'static str,
    capacity_bytes: usize,
    used_bytes: usize,
    allocations: usize,
}

impl Arena {
    pub fn new(name: &'static str, capacity_bytes: usize) -> Self {
        Arena { name, capacity_bytes, used_bytes: 0, allocations: 0 }
    }

    /// Account `size_bytes` against this arena's budget. Fails with a
    /// `Node` out-of-memory error if the configured capacity would be
    /// exceeded.
    pub fn try_alloc(&mut self, size_bytes: usize) -> Result<(), FxtError> {
        let next = self.used_bytes.saturating_add(size_bytes);
        if next > self.capacity_bytes {
            log::error!(
                "arena '{}' out of memory: {} requested, {}/{} used",
                self.name,
                size_bytes,
                self.used_bytes,
                self.capacity_bytes
            );
            return Err(FxtError::node(1, 3)); // NODE:BUILD:OUT_OF_MEMORY
        }
        self.used_bytes = next;
        self.allocations += 1;
        Ok(())
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Bulk-free: the only way a node's arenas ever shrink. Called once,
    /// from `Node`'s `Drop`/rebuild path, never per-object.
    pub fn reset_all(&mut self) {
        self.used_bytes = 0;
        self.allocations = 0;
    }
}

/// The three arenas a `Node` owns, sized once at build time.
#[derive(Debug)]
pub struct Arenas {
    pub general: Arena,
    pub card_stateful: Arena,
    pub ha_stateful: Arena,
}

/// Caller-provided capacities for a node's three arenas.
#[derive(Debug, Clone, Copy)]
pub struct ArenaSizes {
    pub general_bytes: usize,
    pub card_stateful_bytes: usize,
    pub ha_stateful_bytes: usize,
}

impl Default for ArenaSizes {
    fn default() -> Self {
        ArenaSizes {
            general_bytes: 256 * 1024,
            card_stateful_bytes: 64 * 1024,
            ha_stateful_bytes: 128 * 1024,
        }
    }
}

impl Arenas {
    pub fn new(sizes: ArenaSizes) -> Self {
        Arenas {
            general: Arena::new("general", sizes.general_bytes),
            card_stateful: Arena::new("card-stateful", sizes.card_stateful_bytes),
            ha_stateful: Arena::new("ha-stateful", sizes.ha_stateful_bytes),
        }
    }

    pub fn reset_all(&mut self) {
        self.general.reset_all();
        self.card_stateful.reset_all();
        self.ha_stateful.reset_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_within_capacity_succeeds() {
        let mut a = Arena::new("test", 16);
        assert!(a.try_alloc(8).is_ok());
        assert_eq!(a.used_bytes(), 8);
        assert_eq!(a.allocations(), 1);
    }

    #[test]
    fn alloc_beyond_capacity_fails() {
        let mut a = Arena::new("test", 16);
        assert!(a.try_alloc(8).is_ok());
        assert!(a.try_alloc(16).is_err());
        // Failed allocation must not be accounted.
        assert_eq!(a.used_bytes(), 8);
    }

    #[test]
    fn reset_all_clears_budget() {
        let mut a = Arena::new("test", 16);
        a.try_alloc(16).unwrap();
        a.reset_all();
        assert_eq!(a.used_bytes(), 0);
        assert!(a.try_alloc(16).is_ok());
    }
}
