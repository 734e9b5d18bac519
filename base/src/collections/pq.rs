//! A keyed priority queue which yields its *smallest* priority first.
//!
//! Simulated-time events are keyed by the thing they belong to (for
//! example a disk drive) and prioritised by the time at which they
//! are due.  The earliest-due event has to come out first, which is
//! the opposite of what [`KeyedPriorityQueue`] does, so we wrap the
//! priorities in [`ReverseOrdered`].
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;

use keyed_priority_queue::KeyedPriorityQueue;

#[derive(Debug)]
struct ReverseOrdered<T> {
    inner: T,
}

impl<T> From<T> for ReverseOrdered<T> {
    fn from(inner: T) -> ReverseOrdered<T> {
        ReverseOrdered { inner }
    }
}

impl<T: Ord> PartialOrd for ReverseOrdered<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Eq> Eq for ReverseOrdered<T> {}

impl<T: Eq> PartialEq for ReverseOrdered<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: Ord> Ord for ReverseOrdered<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.inner.cmp(&self.inner)
    }
}

#[test]
fn test_reverse_order() {
    assert_eq!(ReverseOrdered::from(1), ReverseOrdered::from(1));
    assert_ne!(ReverseOrdered::from(1), ReverseOrdered::from(0));
    assert!(ReverseOrdered::from(1) < ReverseOrdered::from(0));
    assert!(ReverseOrdered::from(1) <= ReverseOrdered::from(0));
}

/// Returned when an operation names a key which is not queued.
#[derive(Debug, PartialEq, Eq)]
pub struct KeyedReversePriorityQueueUnknownKeyError {}

pub struct KeyedReversePriorityQueue<K: Hash + Eq + Ord, P: Ord> {
    items: KeyedPriorityQueue<K, ReverseOrdered<P>>,
}

impl<K, P> KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord,
    P: Ord,
{
    pub fn new() -> KeyedReversePriorityQueue<K, P> {
        KeyedReversePriorityQueue {
            items: KeyedPriorityQueue::<K, ReverseOrdered<P>>::new(),
        }
    }

    /// The item with the smallest priority, without removing it.
    pub fn peek(&self) -> Option<(&K, &P)> {
        self.items.peek().map(|(k, p)| (k, &p.inner))
    }

    /// Remove and return the item with the smallest priority.
    pub fn pop(&mut self) -> Option<(K, P)> {
        self.items.pop().map(|(k, p)| (k, p.inner))
    }

    /// Queue `key` with `priority`.  If `key` was already queued, its
    /// priority is replaced and the previous priority is returned.
    pub fn push(&mut self, key: K, priority: P) -> Option<P> {
        self.items
            .push(key, ReverseOrdered::from(priority))
            .map(|rd| rd.inner)
    }

    /// Update the priority of a item (identified by `key`) in the
    /// priority queue.
    ///
    /// # Errors
    ///
    /// Err(KeyedReversePriorityQueueUnknownKeyError) is returned when
    /// the indicated key is not present.
    pub fn set_priority(
        &mut self,
        key: &K,
        priority: P,
    ) -> Result<P, KeyedReversePriorityQueueUnknownKeyError> {
        match self.items.set_priority(key, ReverseOrdered::from(priority)) {
            Ok(priority) => Ok(priority.inner),
            Err(_) => Err(KeyedReversePriorityQueueUnknownKeyError {}),
        }
    }

    /// Take `key` out of the queue, returning its priority.
    ///
    /// # Errors
    ///
    /// Err(KeyedReversePriorityQueueUnknownKeyError) is returned when
    /// the indicated key is not present.
    pub fn remove(&mut self, key: &K) -> Result<P, KeyedReversePriorityQueueUnknownKeyError> {
        self.items
            .remove(key)
            .map(|rd| rd.inner)
            .ok_or(KeyedReversePriorityQueueUnknownKeyError {})
    }

    /// The priority of `key`, if it is queued.
    pub fn priority_of(&self, key: &K) -> Option<&P> {
        self.items.get_priority(key).map(|rd| &rd.inner)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.priority_of(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, P> Default for KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord,
    P: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Debug for KeyedReversePriorityQueue<K, P>
where
    K: Hash + Eq + Ord + Debug,
    P: Ord + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedReversePriorityQueue")
            .field("items", &self.items)
            .finish()
    }
}

#[test]
fn test_empty() {
    let mut q: KeyedReversePriorityQueue<usize, usize> = KeyedReversePriorityQueue::default();
    assert!(q.is_empty());
    assert_eq!(0, q.len());
    assert_eq!(q.peek(), None);
    assert_eq!(q.pop(), None);
}

#[test]
fn test_repeat_push() {
    let mut q: KeyedReversePriorityQueue<usize, char> = KeyedReversePriorityQueue::new();
    assert_eq!(q.push(0, '2'), None);
    assert_eq!(q.push(0, '4'), Some('2'));
    assert_eq!(q.push(0, '3'), Some('4'));
    assert_eq!(q.pop(), Some((0, '3')));
    assert!(q.is_empty());
}

#[test]
fn test_ordering() {
    let mut q: KeyedReversePriorityQueue<usize, char> = KeyedReversePriorityQueue::new();
    assert_eq!(q.push(1, '8'), None);
    assert_eq!(q.push(0, '2'), None);
    assert_eq!(q.peek(), Some((&0, &'2')));
    assert_eq!(q.pop(), Some((0, '2')));
    assert_eq!(q.pop(), Some((1, '8')));
    assert!(q.is_empty());
}

#[test]
fn test_remove() {
    let mut q: KeyedReversePriorityQueue<u8, u32> = KeyedReversePriorityQueue::new();
    q.push(3, 300);
    q.push(4, 100);
    assert!(q.contains(&3));
    assert_eq!(q.remove(&3), Ok(300));
    assert!(!q.contains(&3));
    assert_eq!(q.remove(&3), Err(KeyedReversePriorityQueueUnknownKeyError {}));
    assert_eq!(q.priority_of(&4), Some(&100));
    assert_eq!(q.len(), 1);
}

#[test]
fn test_set_priority() {
    let mut q: KeyedReversePriorityQueue<u8, u32> = KeyedReversePriorityQueue::new();
    assert!(q.set_priority(&1, 5).is_err());
    q.push(1, 50);
    q.push(2, 20);
    assert_eq!(q.set_priority(&1, 5), Ok(50));
    assert_eq!(q.pop(), Some((1, 5)));
}
