use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Priority queue entry wrapper
///
/// Wraps any item with a floating-point priority and an insertion sequence number.
/// Higher priority values are popped first; equal priorities pop in insertion order.
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    /// Priority value (higher values = higher priority)
    pub priority: f64,
    /// Insertion counter used to break ties
    pub seq: u64,
    /// The wrapped item
    pub item: T,
}

impl<T> PartialEq for QueueItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for QueueItem<T> {}

impl<T> PartialOrd for QueueItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; for ties the older entry (smaller seq) is "greater".
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Max-priority queue with FIFO tie-breaking.
///
/// Duplicate items are allowed; the queue does not deduplicate.
///
/// # Examples
///
/// ```
/// use multiverse::domain::models::PriorityQueue;
///
/// let mut queue = PriorityQueue::new();
/// queue.push("low", 0.1);
/// queue.push("high", 0.9);
/// queue.push("medium", 0.5);
///
/// assert_eq!(queue.pop(), Some("high"));
/// assert_eq!(queue.pop(), Some("medium"));
/// assert_eq!(queue.pop(), Some("low"));
/// assert_eq!(queue.pop(), None);
/// ```
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    heap: BinaryHeap<QueueItem<T>>,
    next_seq: u64,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    /// Creates a new empty queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Adds an item with the given priority.
    ///
    /// Priorities are ordered with `f64::total_cmp`; frontiers reject NaN before pushing.
    pub fn push(&mut self, item: T, priority: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueItem { priority, seq, item });
    }

    /// Removes and returns the highest priority item
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Removes up to `n` items in descending priority order
    pub fn pop_many(&mut self, n: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(n.min(self.heap.len()));
        while out.len() < n {
            match self.heap.pop() {
                Some(entry) => out.push(entry.item),
                None => break,
            }
        }
        out
    }

    /// Returns the highest priority without removing it
    pub fn peek_priority(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
