use std::fmt::Debug;

const NONE: usize = usize::MAX;

/// Returned by [`Pool::allocate`] when every slot is live.
///
/// Hands the rejected value back so the caller can decide what to do with it.
#[derive(Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pool capacity exhausted")]
pub struct OutOfCapacity<T>(pub T);

impl<T> Debug for OutOfCapacity<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("pool capacity exhausted")
    }
}

enum Entry<T> {
    Vacant { next: usize },
    Occupied(T),
}

/// Fixed-capacity slot allocator.
///
/// All storage is reserved up front; `allocate` and `deallocate` are O(1)
/// and never touch the heap. Vacant entries form an intrusive LIFO free
/// list, so `free() + len() == capacity()` holds at all times.
///
/// The pool is not synchronized. Whoever owns it serializes access.
pub struct Pool<T> {
    entries: Box<[Entry<T>]>,
    free_head: usize,
    len: usize,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let entries = (0..capacity)
            .map(|i| Entry::Vacant {
                next: if i + 1 < capacity { i + 1 } else { NONE },
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            entries,
            free_head: if capacity > 0 { 0 } else { NONE },
            len: 0,
        }
    }

    /// Place `value` in a free slot and return its key.
    #[inline]
    pub fn allocate(&mut self, value: T) -> Result<usize, OutOfCapacity<T>> {
        let key = self.free_head;
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(OutOfCapacity(value));
        };

        let Entry::Vacant { next } = *entry else {
            unreachable!("free list points at occupied slot {key}");
        };

        self.free_head = next;
        *entry = Entry::Occupied(value);
        self.len += 1;
        Ok(key)
    }

    /// Release the slot at `key` and return its value.
    ///
    /// # Panics
    /// Panics if `key` is out of range or the slot is not live. Releasing a
    /// slot twice is a caller bug, not a runtime condition.
    #[inline]
    pub fn deallocate(&mut self, key: usize) -> T {
        match self.try_deallocate(key) {
            Some(value) => value,
            None => panic!("slot {key} is not allocated"),
        }
    }

    /// Release the slot at `key` if it is live.
    #[inline]
    pub fn try_deallocate(&mut self, key: usize) -> Option<T> {
        let entry = self.entries.get_mut(key)?;
        if !matches!(entry, Entry::Occupied(_)) {
            return None;
        }

        let old = std::mem::replace(
            entry,
            Entry::Vacant {
                next: self.free_head,
            },
        );
        self.free_head = key;
        self.len -= 1;

        match old {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    #[inline]
    pub fn get(&self, key: usize) -> Option<&T> {
        match self.entries.get(key)? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        match self.entries.get_mut(key)? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    #[inline]
    pub fn is_occupied(&self, key: usize) -> bool {
        self.get(key).is_some()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len >= self.entries.len()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of slots still available.
    #[inline(always)]
    pub fn free(&self) -> usize {
        self.entries.len() - self.len
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}
