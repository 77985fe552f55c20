//! Bounded history of recent detections shown in the preview slots.

use std::collections::VecDeque;

/// An ordered, bounded sequence without duplicate values.
///
/// Appending a value that is already present is a no-op; appending past the
/// capacity evicts the oldest value.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: PartialEq + Clone> HistoryBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: VecDeque::with_capacity(capacity) }
    }

    /// Appends `item` unless an equal value is already buffered. Returns
    /// whether the item was inserted.
    pub fn append(&mut self, item: T) -> bool {
        if self.capacity == 0 || self.items.contains(&item) {
            return false;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
        true
    }

    /// An owned copy of the buffered values, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The most values the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every buffered value.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = HistoryBuffer::new(3);
        for i in 1..=5 {
            buffer.append(i);
        }
        assert_eq!(buffer.snapshot(), vec![3, 4, 5]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_reappend_is_idempotent() {
        let mut buffer = HistoryBuffer::new(3);
        assert!(buffer.append("a"));
        assert!(buffer.append("b"));
        assert!(!buffer.append("a"));
        assert_eq!(buffer.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_evicted_value_can_return() {
        let mut buffer = HistoryBuffer::new(2);
        buffer.append(1);
        buffer.append(2);
        buffer.append(3);
        assert!(buffer.append(1));
        assert_eq!(buffer.snapshot(), vec![3, 1]);
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let mut buffer = HistoryBuffer::new(0);
        assert!(!buffer.append(1));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.append(1);
        let snapshot = buffer.snapshot();
        buffer.clear();
        assert_eq!(snapshot, vec![1]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);
    }
}
