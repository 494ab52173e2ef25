//! Generation-tagged slot table.
//!
//! Sessions live in a `Vec` of slots addressed by [`Handle`]. Removing a
//! session bumps its slot's generation and puts the slot on a free list, so
//! a slot can be reused while every handle ever issued for it stays
//! distinct.

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::Handle;

// ============================================================================
// Slot
// ============================================================================

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

// ============================================================================
// SessionTable
// ============================================================================

/// Arena of values addressed by generation-tagged handles.
#[derive(Debug)]
pub struct SessionTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SessionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionTable<T> {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no value is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value and returns its handle.
    pub fn insert(&mut self, value: T) -> Handle {
        self.insert_with(|_| value)
    }

    /// Inserts the value built by `make`, which receives the handle the
    /// value will live under.
    pub fn insert_with(&mut self, make: impl FnOnce(Handle) -> T) -> Handle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        let handle = Handle::new(index, slot.generation)
            .unwrap_or_else(|| unreachable!("slot generations start at 1"));
        slot.value = Some(make(handle));
        self.len += 1;
        handle
    }

    /// Returns the value for a live handle.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns the value for a live handle mutably.
    #[must_use]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Returns `true` if the handle names a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the value for a live handle.
    ///
    /// The handle is invalid afterwards. Removing a stale handle returns
    /// `None` and changes nothing.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())?;
        let value = slot.value.take()?;

        // A slot whose generation would wrap is retired for good.
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(handle.index());
            }
            None => slot.generation = u32::MAX,
        }
        self.len -= 1;
        Some(value)
    }

    /// Returns the handles of all live values.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .filter_map(|(index, slot)| Handle::new(index as u32, slot.generation))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
