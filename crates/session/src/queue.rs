//! FIFO queue of historical sessions

use std::collections::VecDeque;

/// First-in first-out queue; the front is the oldest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue<T> {
    items: VecDeque<T>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append at the back
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Remove and return the front
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn peek_front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn peek_front_mut(&mut self) -> Option<&mut T> {
        self.items.front_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Front-to-back traversal of the current contents.
    ///
    /// The iterator borrows the queue, so it cannot outlive a mutation; call
    /// `iter` again to see later changes.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PartialEq> Queue<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Enqueue unless an equal item is already queued
    pub fn enqueue_unique(&mut self, item: T) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.enqueue(item);
        true
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Queue<T> {
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
    fn test_fifo_order() {
        let mut queue = Queue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        assert_eq!(queue.peek_front(), Some(&1));
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_unique() {
        let mut queue = Queue::new();
        assert!(queue.enqueue_unique("a"));
        assert!(!queue.enqueue_unique("a"));
        assert!(queue.enqueue_unique("b"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut queue: Queue<u8> = (1..=3).collect();
        let first: Vec<_> = queue.iter().copied().collect();
        let second: Vec<_> = (&queue).into_iter().copied().collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(first, second);

        queue.dequeue();
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_peek_front_mut() {
        let mut queue: Queue<u8> = vec![1, 2].into_iter().collect();
        if let Some(front) = queue.peek_front_mut() {
            *front = 9;
        }
        assert_eq!(queue.peek_front(), Some(&9));
        queue.clear();
        assert_eq!(queue.peek_front(), None);
    }
}
