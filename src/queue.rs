use std::collections::HashMap;

use crate::slot::{OutOfCapacity, Pool};

const NONE: u32 = u32::MAX;

/// A queued value together with its ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub id: u64,
    pub deadline_ns: u64,
    pub value: T,
}

/// Fixed-capacity min-heap ordered by `(deadline_ns, id)`.
///
/// Entries live in a [`Pool`]; the heap only shuffles `u32` pool keys.
/// `heap_pos` maps each pool key back to its heap position and `index`
/// maps ids to pool keys, so removal by id is O(log n) instead of a scan.
/// The pool and heap tables are sized at construction and never grow. The
/// id index is reserved up front and never holds more than `capacity` ids.
///
/// Equal deadlines pop in id order.
pub struct DeadlineQueue<T> {
    entries: Pool<Entry<T>>,
    heap: Vec<u32>,
    heap_pos: Box<[u32]>,
    index: HashMap<u64, u32>,
}

impl<T> DeadlineQueue<T> {
    pub fn with_capacity(capacity: u32) -> Self {
        let cap = capacity as usize;
        Self {
            entries: Pool::with_capacity(cap),
            heap: Vec::with_capacity(cap),
            heap_pos: vec![NONE; cap].into_boxed_slice(),
            index: HashMap::with_capacity(cap),
        }
    }

    /// Queue `value` under `id`. Ids must be unique among live entries.
    pub fn push(&mut self, id: u64, deadline_ns: u64, value: T) -> Result<(), OutOfCapacity<T>> {
        debug_assert!(!self.index.contains_key(&id), "duplicate id {id}");

        let key = self
            .entries
            .allocate(Entry {
                id,
                deadline_ns,
                value,
            })
            .map_err(|OutOfCapacity(entry)| OutOfCapacity(entry.value))?;
        let key = key as u32;

        let pos = self.heap.len() as u32;
        self.heap.push(key);
        self.heap_pos[key as usize] = pos;
        self.index.insert(id, key);

        self.swim(pos);
        Ok(())
    }

    /// Remove the entry queued under `id`, wherever it sits in the heap.
    pub fn remove(&mut self, id: u64) -> Option<Entry<T>> {
        let key = self.index.remove(&id)?;
        Some(self.remove_key(key))
    }

    /// Pop the earliest entry if its deadline is at or before `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<Entry<T>> {
        if self.peek_deadline()? > now_ns {
            return None;
        }
        self.pop()
    }

    /// Pop the earliest entry regardless of its deadline.
    pub fn pop(&mut self) -> Option<Entry<T>> {
        let key = *self.heap.first()?;
        let id = self.entry(key).id;
        self.index.remove(&id);
        Some(self.remove_key(key))
    }

    #[inline]
    pub fn peek_deadline(&self) -> Option<u64> {
        self.heap.first().map(|&key| self.entry(key).deadline_ns)
    }

    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.index.contains_key(&id)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    fn remove_key(&mut self, key: u32) -> Entry<T> {
        let pos = self.heap_pos[key as usize];
        debug_assert_ne!(pos, NONE, "key {key} is not queued");

        self.heap.swap_remove(pos as usize);
        if (pos as usize) < self.heap.len() {
            let moved = self.heap[pos as usize];
            self.heap_pos[moved as usize] = pos;

            self.sink(pos);
            self.swim(pos);
        }

        self.heap_pos[key as usize] = NONE;
        self.entries.deallocate(key as usize)
    }

    #[inline]
    fn entry(&self, key: u32) -> &Entry<T> {
        match self.entries.get(key as usize) {
            Some(entry) => entry,
            None => panic!("heap references vacant key {key}"),
        }
    }

    #[inline]
    fn swim(&mut self, mut pos: u32) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.less(pos, parent) {
                self.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    #[inline]
    fn sink(&mut self, mut pos: u32) {
        let len = self.heap.len() as u32;
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut smallest = pos;

            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }

            if smallest == pos {
                break;
            }

            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    #[inline]
    fn swap(&mut self, a: u32, b: u32) {
        self.heap.swap(a as usize, b as usize);
        self.heap_pos[self.heap[a as usize] as usize] = a;
        self.heap_pos[self.heap[b as usize] as usize] = b;
    }

    #[inline]
    fn less(&self, a: u32, b: u32) -> bool {
        let a = self.entry(self.heap[a as usize]);
        let b = self.entry(self.heap[b as usize]);
        (a.deadline_ns, a.id) < (b.deadline_ns, b.id)
    }
}

impl<T> Iterator for DeadlineQueue<T> {
    type Item = Entry<T>;

    /// Drains in deadline order.
    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }
}
