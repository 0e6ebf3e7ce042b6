//! Fixed-capacity priority queue of pending rollouts.
//!
//! Elements live in a `BTreeMap` keyed by `(rank, insertion order)`, so push,
//! pop and eviction are all `O(log n)`. The ordering strategy is a type
//! parameter: [`MaxFirst`] pops the highest priority and evicts the lowest,
//! [`MinFirst`] does the opposite.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::error::{DynaError, Result};

/// Comparator strategy for [`BoundedPriorityQueue`].
///
/// `compare(a, b) == Greater` means `a` is served before `b` and `b` is
/// evicted before `a`.
pub trait PriorityOrder {
    fn compare(a: f32, b: f32) -> Ordering;
}

/// Highest priority is popped first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxFirst;

/// Lowest priority is popped first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinFirst;

impl PriorityOrder for MaxFirst {
    fn compare(a: f32, b: f32) -> Ordering {
        a.total_cmp(&b)
    }
}

impl PriorityOrder for MinFirst {
    fn compare(a: f32, b: f32) -> Ordering {
        b.total_cmp(&a)
    }
}

struct QueueKey<O> {
    priority: f32,
    seq: u64,
    _order: PhantomData<O>,
}

impl<O: PriorityOrder> Ord for QueueKey<O> {
    // Among equal priorities the oldest entry ranks highest.
    fn cmp(&self, other: &Self) -> Ordering {
        O::compare(self.priority, other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<O: PriorityOrder> PartialOrd for QueueKey<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: PriorityOrder> PartialEq for QueueKey<O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<O: PriorityOrder> Eq for QueueKey<O> {}

/// Priority queue that never holds more than `capacity` elements.
///
/// When a push overflows the capacity, the worst-ranked element is evicted;
/// that can be the element that was just pushed.
pub struct BoundedPriorityQueue<T, O: PriorityOrder = MaxFirst> {
    entries: BTreeMap<QueueKey<O>, T>,
    capacity: usize,
    next_seq: u64,
}

impl<T, O: PriorityOrder> BoundedPriorityQueue<T, O> {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DynaError::invalid_parameter("maxlen", "queue capacity must be at least 1"));
        }
        Ok(BoundedPriorityQueue {
            entries: BTreeMap::new(),
            capacity,
            next_seq: 0,
        })
    }

    /// Insert `item`. Returns the evicted element if the queue overflowed.
    pub fn push(&mut self, item: T, priority: f32) -> Result<Option<(T, f32)>> {
        if priority.is_nan() {
            return Err(DynaError::NumericInstability("NaN queue priority".to_string()));
        }
        let key = QueueKey {
            priority,
            seq: self.next_seq,
            _order: PhantomData,
        };
        self.next_seq += 1;
        self.entries.insert(key, item);

        if self.entries.len() > self.capacity {
            Ok(self.entries.pop_first().map(|(key, item)| (item, key.priority)))
        } else {
            Ok(None)
        }
    }

    /// Remove and return the best-ranked element with its priority.
    pub fn pop(&mut self) -> Result<(T, f32)> {
        self.entries
            .pop_last()
            .map(|(key, item)| (item, key.priority))
            .ok_or(DynaError::EmptyQueue)
    }

    /// Priority of the element [`BoundedPriorityQueue::pop`] would return.
    pub fn peek_priority(&self) -> Option<f32> {
        self.entries.last_key_value().map(|(key, _)| key.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Priorities of the current members, worst-ranked first.
    pub fn priorities(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.keys().map(|key| key.priority)
    }
}

impl<T> BoundedPriorityQueue<T, MaxFirst> {
    /// Remove and return the element with the highest priority.
    pub fn pop_max(&mut self) -> Result<(T, f32)> {
        self.pop()
    }
}

impl<T, O: PriorityOrder> std::fmt::Debug for BoundedPriorityQueue<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedPriorityQueue")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("peek_priority", &self.peek_priority())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_max_order() {
        let mut queue: BoundedPriorityQueue<&str> = BoundedPriorityQueue::with_capacity(10).unwrap();
        queue.push("low", 0.5).unwrap();
        queue.push("high", 3.0).unwrap();
        queue.push("mid", 1.0).unwrap();

        assert_eq!(queue.pop_max().unwrap(), ("high", 3.0));
        assert_eq!(queue.pop_max().unwrap(), ("mid", 1.0));
        assert_eq!(queue.pop_max().unwrap(), ("low", 0.5));
        assert_eq!(queue.pop_max().unwrap_err(), DynaError::EmptyQueue);
    }

    #[test]
    fn test_eviction_drops_lowest() {
        let mut queue: BoundedPriorityQueue<u32> = BoundedPriorityQueue::with_capacity(2).unwrap();
        assert!(queue.push(1, 1.0).unwrap().is_none());
        assert!(queue.push(2, 2.0).unwrap().is_none());
        assert_eq!(queue.push(3, 3.0).unwrap(), Some((1, 1.0)));
        // The newcomer itself is evicted when it ranks lowest.
        assert_eq!(queue.push(4, 0.1).unwrap(), Some((4, 0.1)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_ties_pop_oldest_and_evict_newest() {
        let mut queue: BoundedPriorityQueue<u32> = BoundedPriorityQueue::with_capacity(2).unwrap();
        queue.push(1, 1.0).unwrap();
        queue.push(2, 1.0).unwrap();
        assert_eq!(queue.push(3, 1.0).unwrap(), Some((3, 1.0)));
        assert_eq!(queue.pop_max().unwrap().0, 1);
        assert_eq!(queue.pop_max().unwrap().0, 2);
    }

    #[test]
    fn test_min_first_strategy() {
        let mut queue: BoundedPriorityQueue<u32, MinFirst> = BoundedPriorityQueue::with_capacity(2).unwrap();
        queue.push(1, 5.0).unwrap();
        queue.push(2, 1.0).unwrap();
        assert_eq!(queue.push(3, 3.0).unwrap(), Some((1, 5.0)));
        assert_eq!(queue.pop().unwrap(), (2, 1.0));
    }

    #[test]
    fn test_rejects_nan_and_zero_capacity() {
        assert!(BoundedPriorityQueue::<u8>::with_capacity(0).is_err());
        let mut queue: BoundedPriorityQueue<u8> = BoundedPriorityQueue::with_capacity(1).unwrap();
        assert!(matches!(queue.push(0, f32::NAN), Err(DynaError::NumericInstability(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_peek_and_clear() {
        let mut queue: BoundedPriorityQueue<u8> = BoundedPriorityQueue::with_capacity(4).unwrap();
        assert_eq!(queue.peek_priority(), None);
        queue.push(0, 0.3).unwrap();
        queue.push(1, 0.7).unwrap();
        assert_eq!(queue.peek_priority(), Some(0.7));
        assert_eq!(queue.priorities().collect::<Vec<_>>(), vec![0.3, 0.7]);
        queue.clear();
        assert!(queue.is_empty());
    }
}
