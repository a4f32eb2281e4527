use std::collections::VecDeque;

/// A strict FIFO queue with a single logical owner.
///
/// This is a plain container: no operation blocks or fails, and there is
/// no internal locking. Safety comes entirely from ownership — each
/// host's queue is touched only by `submit` and by that host's own drain
/// loop, under the scheduler's registry lock.
#[derive(Debug)]
pub struct Queue<T> {
    items: VecDeque<T>,
}

impl<T> Queue<T> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append an item at the tail
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// Remove and return the head, or `None` if the queue is empty
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Return the head without removing it
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Number of queued items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop all queued items
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
