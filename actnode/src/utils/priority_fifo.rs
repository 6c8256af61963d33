use crate::core::{Priority, PrioritySet};

const NIL: u8 = u8::MAX;
const LEVELS: usize = Priority::COUNT;

/// Fixed-capacity queue with one FIFO per priority level
///
/// Entries live in a static slot array threaded by index links. Every level and the
/// free list are singly-linked lists, so push and pop are O(1) and never move values.
pub struct PriorityFifo<V, const N: usize> {
    values: [Option<V>; N],
    next: [u8; N],
    head: [u8; LEVELS],
    tail: [u8; LEVELS],
    free: u8,
    levels: PrioritySet,
    len: usize,
}

impl<V, const N: usize> PriorityFifo<V, N> {
    const CAPACITY_CHECK: () = assert!(N < NIL as usize);

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            values: core::array::from_fn(|_| None),
            next: core::array::from_fn(|i| if i + 1 < N { (i + 1) as u8 } else { NIL }),
            head: [NIL; LEVELS],
            tail: [NIL; LEVELS],
            free: if N > 0 { 0 } else { NIL },
            levels: PrioritySet::NONE,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn vacant(&self) -> usize {
        N - self.len
    }

    /// Non-empty priority levels
    pub fn priorities(&self) -> PrioritySet {
        self.levels
    }

    /// Appends a value behind all values of the same priority.
    pub fn push(&mut self, priority: Priority, value: V) -> Result<(), V> {
        if self.free == NIL {
            return Err(value);
        }
        let slot = self.free;
        self.free = self.next[usize::from(slot)];
        self.next[usize::from(slot)] = NIL;
        self.values[usize::from(slot)] = Some(value);

        let level = usize::from(priority);
        match self.tail[level] {
            NIL => self.head[level] = slot,
            last => self.next[usize::from(last)] = slot,
        }
        self.tail[level] = slot;
        self.levels.insert(priority);
        self.len += 1;
        Ok(())
    }

    pub fn front(&self, priority: Priority) -> Option<&V> {
        match self.head[usize::from(priority)] {
            NIL => None,
            slot => self.values[usize::from(slot)].as_ref(),
        }
    }

    pub fn pop(&mut self, priority: Priority) -> Option<V> {
        let level = usize::from(priority);
        let slot = self.head[level];
        if slot == NIL {
            return None;
        }
        self.head[level] = self.next[usize::from(slot)];
        if self.head[level] == NIL {
            self.tail[level] = NIL;
            self.levels.remove(priority);
        }
        self.next[usize::from(slot)] = self.free;
        self.free = slot;
        self.len -= 1;
        self.values[usize::from(slot)].take()
    }
}

impl<V, const N: usize> Default for PriorityFifo<V, N> {
    fn default() -> Self {
        Self::new()
    }
}
