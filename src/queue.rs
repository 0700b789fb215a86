//! Bounded blocking FIFO between the acceptor and the workers.
//!
//! `put` suspends while the queue is full and `take` suspends while it is
//! empty. Both watch a [`CancelToken`] while suspended and give up with
//! [`Cancelled`] once it fires; nothing is retried or redelivered.

use crate::cancel::{CancelToken, CANCEL_POLL_INTERVAL};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

/// A blocking operation was abandoned because its token was cancelled.
///
/// A cancelled `put` hands the rejected item back.
#[derive(Debug, PartialEq, Eq)]
pub struct Cancelled<T = ()>(pub T);

impl<T> fmt::Display for Cancelled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue operation cancelled")
    }
}

impl<T: fmt::Debug> std::error::Error for Cancelled<T> {}

/// Capacity-bounded FIFO safe for any number of producers and consumers.
pub struct ConnectionQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> ConnectionQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append `item` at the tail, waiting for room while the queue is full.
    pub fn put(&self, item: T, cancel: &CancelToken) -> Result<(), Cancelled<T>> {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            if cancel.is_cancelled() {
                return Err(Cancelled(item));
            }
            self.not_full.wait_for(&mut items, CANCEL_POLL_INTERVAL);
        }

        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head item, waiting for one while the queue is empty.
    pub fn take(&self, cancel: &CancelToken) -> Result<T, Cancelled> {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.not_full.notify_one();
                return Ok(item);
            }
            if cancel.is_cancelled() {
                return Err(Cancelled(()));
            }
            self.not_empty.wait_for(&mut items, CANCEL_POLL_INTERVAL);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const BLOCKED: Duration = Duration::from_millis(150);
    const RESUMED: Duration = Duration::from_secs(5);

    #[test]
    fn test_fifo_order() {
        let queue = ConnectionQueue::new(5);
        let cancel = CancelToken::new();

        for i in 1..=5 {
            queue.put(i, &cancel).unwrap();
        }
        assert_eq!(queue.len(), 5);

        for i in 1..=5 {
            assert_eq!(queue.take(&cancel).unwrap(), i);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_single_producer_many_consumers() {
        const ITEMS: usize = 2000;
        const CONSUMERS: usize = 4;

        let queue = Arc::new(ConnectionQueue::new(8));
        let cancel = CancelToken::new();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let cancel = cancel.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Ok(item) = queue.take(&cancel) {
                        assert!(queue.len() <= queue.capacity());
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        for i in 0..ITEMS {
            queue.put(i, &cancel).unwrap();
            assert!(queue.len() <= queue.capacity());
        }
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        cancel.cancel();

        let mut all = Vec::with_capacity(ITEMS);
        for consumer in consumers {
            let seen = consumer.join().unwrap();
            // Each consumer observes items in the order they were queued.
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            all.extend(seen);
        }
        all.sort_unstable();
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    }

    #[test]
    fn test_take_blocks_until_put() {
        let queue = Arc::new(ConnectionQueue::new(1));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let taker = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || {
                let _ = tx.send(queue.take(&cancel));
            })
        };

        assert!(rx.recv_timeout(BLOCKED).is_err());

        queue.put(42, &cancel).unwrap();
        assert_eq!(rx.recv_timeout(RESUMED).unwrap(), Ok(42));
        taker.join().unwrap();
    }

    #[test]
    fn test_put_wakes_exactly_one_taker() {
        let queue = Arc::new(ConnectionQueue::new(4));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let takers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let cancel = cancel.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    let _ = tx.send(queue.take(&cancel));
                })
            })
            .collect();
        drop(tx);

        thread::sleep(BLOCKED);
        queue.put(7, &cancel).unwrap();

        assert_eq!(rx.recv_timeout(RESUMED).unwrap(), Ok(7));
        assert!(rx.recv_timeout(BLOCKED).is_err());

        cancel.cancel();
        assert_eq!(rx.recv_timeout(RESUMED).unwrap(), Err(Cancelled(())));
        for taker in takers {
            taker.join().unwrap();
        }
    }

    #[test]
    fn test_put_blocks_while_full() {
        let queue = Arc::new(ConnectionQueue::new(2));
        let cancel = CancelToken::new();
        queue.put(1, &cancel).unwrap();
        queue.put(2, &cancel).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || {
                let _ = tx.send(queue.put(3, &cancel));
            })
        };

        assert!(rx.recv_timeout(BLOCKED).is_err());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.take(&cancel).unwrap(), 1);
        assert_eq!(rx.recv_timeout(RESUMED).unwrap(), Ok(()));
        producer.join().unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take(&cancel).unwrap(), 2);
        assert_eq!(queue.take(&cancel).unwrap(), 3);
    }

    #[test]
    fn test_cancelled_take_returns() {
        let queue: Arc<ConnectionQueue<u32>> = Arc::new(ConnectionQueue::new(1));
        let cancel = CancelToken::new();

        let taker = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::spawn(move || queue.take(&cancel))
        };

        thread::sleep(BLOCKED);
        cancel.cancel();
        assert_eq!(taker.join().unwrap(), Err(Cancelled(())));
    }

    #[test]
    fn test_cancelled_put_hands_item_back() {
        let queue = ConnectionQueue::new(1);
        let cancel = CancelToken::new();
        queue.put("first", &cancel).unwrap();

        cancel.cancel();
        assert_eq!(queue.put("second", &cancel), Err(Cancelled("second")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancelled_token_still_drains_ready_items() {
        let queue = ConnectionQueue::new(2);
        let cancel = CancelToken::new();
        queue.put(1, &cancel).unwrap();

        cancel.cancel();
        assert_eq!(queue.take(&cancel), Ok(1));
        assert_eq!(queue.take(&cancel), Err(Cancelled(())));
    }
}
