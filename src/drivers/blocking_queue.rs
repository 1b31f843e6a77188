//! # Fixed-capacity blocking FIFO.
//!
//! [`BlockingQueue`] is a ring buffer guarded by a [`parking_lot::Mutex`]
//! with two condition variables (`not_empty`, `not_full`). Each side comes in
//! three flavours:
//!
//! ```text
//! non-blocking   enqueue / dequeue                  full/empty → refuse
//! blocking       enqueue_with_block / dequeue_with_block   wait forever
//! bounded wait   enqueue_with_timeout / dequeue_with_timeout
//! ```
//!
//! Blocking calls park the OS thread. From async code use the non-blocking
//! variants or move the call to `spawn_blocking`.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn push(&mut self, item: T) {
        let tail = (self.head + self.len) % self.capacity();
        self.slots[tail] = Some(item);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    fn clear(&mut self) -> usize {
        let dropped = self.len;
        while self.pop().is_some() {}
        self.head = 0;
        dropped
    }
}

/// Bounded FIFO with blocking and timed operations.
///
/// Refused items are handed back through `Err` so the caller keeps ownership.
pub struct BlockingQueue<T> {
    ring: Mutex<Ring<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates a queue holding at most `capacity` items (`0` is treated as `1`).
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity.max(1))),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Appends `item` if there is room.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        self.enqueue_then(item, None, || {})
    }

    /// Appends `item`, waiting for room as long as needed.
    pub fn enqueue_with_block(&self, item: T) {
        let mut ring = self.ring.lock();
        while ring.is_full() {
            self.not_full.wait(&mut ring);
        }
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Appends `item`, waiting at most `timeout` for room.
    pub fn enqueue_with_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.enqueue_then(item, Some(timeout), || {})
    }

    /// Appends `item`, waiting up to `wait` for room, and runs `on_push`
    /// under the queue lock once the item is in.
    pub(crate) fn enqueue_then(
        &self,
        item: T,
        wait: Option<Duration>,
        on_push: impl FnOnce(),
    ) -> Result<(), T> {
        let mut ring = self.ring.lock();
        if ring.is_full() {
            let Some(timeout) = wait else {
                return Err(item);
            };
            let deadline = Instant::now() + timeout;
            while ring.is_full() {
                if self.not_full.wait_until(&mut ring, deadline).timed_out() && ring.is_full() {
                    return Err(item);
                }
            }
        }
        ring.push(item);
        on_push();
        drop(ring);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the oldest item, if any.
    pub fn dequeue(&self) -> Option<T> {
        self.dequeue_then(|| {})
    }

    /// Removes the oldest item, if any, running `on_pop` under the queue lock.
    pub(crate) fn dequeue_then(&self, on_pop: impl FnOnce()) -> Option<T> {
        let mut ring = self.ring.lock();
        let item = ring.pop()?;
        on_pop();
        drop(ring);
        self.not_full.notify_one();
        Some(item)
    }

    /// Removes the oldest item, waiting for one as long as needed.
    pub fn dequeue_with_block(&self) -> T {
        let mut ring = self.ring.lock();
        loop {
            if let Some(item) = ring.pop() {
                drop(ring);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut ring);
        }
    }

    /// Removes the oldest item, waiting at most `timeout` for one.
    pub fn dequeue_with_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut ring = self.ring.lock();
        loop {
            if let Some(item) = ring.pop() {
                drop(ring);
                self.not_full.notify_one();
                return Some(item);
            }
            if self.not_empty.wait_until(&mut ring, deadline).timed_out() {
                let item = ring.pop();
                drop(ring);
                if item.is_some() {
                    self.not_full.notify_one();
                }
                return item;
            }
        }
    }

    /// Drops every queued item and returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.clear_then(|_| {})
    }

    /// Like [`clear`](Self::clear), handing the count to `on_clear` under the queue lock.
    pub(crate) fn clear_then(&self, on_clear: impl FnOnce(usize)) -> usize {
        let mut ring = self.ring.lock();
        let dropped = ring.clear();
        on_clear(dropped);
        drop(ring);
        if dropped > 0 {
            self.not_full.notify_all();
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().len == 0
    }

    pub fn is_full(&self) -> bool {
        self.ring.lock().is_full()
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &ring.len)
            .field("capacity", &ring.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_and_wraparound() {
        let q = BlockingQueue::new(3);
        for round in 0..4 {
            q.enqueue(round * 10).unwrap();
            q.enqueue(round * 10 + 1).unwrap();
            assert_eq!(q.dequeue(), Some(round * 10));
            assert_eq!(q.dequeue(), Some(round * 10 + 1));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_full_queue_hands_item_back() {
        let q = BlockingQueue::new(2);
        q.enqueue("a").unwrap();
        q.enqueue("b").unwrap();
        assert!(q.is_full());
        assert_eq!(q.enqueue("c"), Err("c"));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let q = BlockingQueue::new(0);
        assert_eq!(q.capacity(), 1);
        q.enqueue(1).unwrap();
        assert!(q.enqueue(2).is_err());
    }

    #[test]
    fn test_timeouts_expire() {
        let q = BlockingQueue::new(1);
        assert_eq!(q.dequeue_with_timeout(Duration::from_millis(20)), None);

        q.enqueue(1).unwrap();
        let started = Instant::now();
        assert_eq!(q.enqueue_with_timeout(2, Duration::from_millis(20)), Err(2));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_blocked_dequeue_wakes_on_enqueue() {
        let q = Arc::new(BlockingQueue::new(1));
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.dequeue_with_block())
        };
        thread::sleep(Duration::from_millis(20));
        q.enqueue(42).unwrap();
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn test_blocked_enqueue_wakes_on_dequeue() {
        let q = Arc::new(BlockingQueue::new(1));
        q.enqueue(1).unwrap();
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.enqueue_with_block(2))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.dequeue(), Some(1));
        producer.join().unwrap();
        assert_eq!(q.dequeue_with_timeout(Duration::from_secs(1)), Some(2));
    }

    #[test]
    fn test_clear_unblocks_producer() {
        let q = Arc::new(BlockingQueue::new(1));
        q.enqueue(1).unwrap();
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.enqueue_with_timeout(2, Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.clear(), 1);
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(q.len(), 1);
    }
}
