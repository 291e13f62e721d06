use std::collections::VecDeque;

/// Fixed-capacity ring list. Pushing onto a full buffer evicts the oldest item.
///
/// Indexing starts at the oldest retained item.
#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> CircularBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, returning the evicted oldest item when the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn remove_first(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a CircularBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_within_capacity_keeps_everything() {
        let mut buf = CircularBuffer::new(3);
        assert!(buf.push(1).is_none());
        assert!(buf.push(2).is_none());
        assert_eq!(buf.len(), 2);
        assert!(!buf.is_full());
        assert_eq!(buf.first(), Some(&1));
        assert_eq!(buf.last(), Some(&2));
    }

    #[test]
    fn push_on_full_buffer_evicts_oldest() {
        let mut buf = CircularBuffer::new(3);
        buf.push('a');
        buf.push('b');
        buf.push('c');
        assert!(buf.is_full());

        assert_eq!(buf.push('d'), Some('a'));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec!['b', 'c', 'd']);
        assert_eq!(buf.get(0), Some(&'b'));
        assert_eq!(buf.get(2), Some(&'d'));
        assert_eq!(buf.get(3), None);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buf = CircularBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(10);
        assert_eq!(buf.push(11), Some(10));
        assert_eq!(buf.last(), Some(&11));
    }

    #[test]
    fn remove_first_and_clear() {
        let mut buf = CircularBuffer::new(4);
        for i in 0..4 {
            buf.push(i);
        }
        assert_eq!(buf.remove_first(), Some(0));
        assert_eq!(buf.len(), 3);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.remove_first(), None);
    }

    #[test]
    fn wraps_many_times() {
        let mut buf = CircularBuffer::new(5);
        for i in 0..103 {
            buf.push(i);
        }
        let kept: Vec<i32> = (&buf).into_iter().copied().collect();
        assert_eq!(kept, vec![98, 99, 100, 101, 102]);
    }
}
