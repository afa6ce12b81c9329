//! Bounded blocking queue with close, terminate and interrupt signals.
//!
//! The inbound side of every connection is one of these. Its capacity is the
//! receive high-water mark: producers block while it is full.

use std::collections::VecDeque;
use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::errors::{TransportError, TransportResult};

/// Something the context can tear down.
pub(crate) trait Resource: Send + Sync {
    /// Context termination: blocked calls fail with `Terminated`.
    fn terminate(&self);
    /// Orderly close: readers drain what is queued, then see end-of-stream.
    fn close(&self);
    /// Wakes a blocked reader, which sees end-of-stream.
    fn interrupt(&self);
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    terminated: bool,
    interrupted: bool,
    failure: Option<(io::ErrorKind, String)>,
}

pub(crate) struct Queue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    readable: Condvar,
    writable: Condvar,
}

impl<T> Queue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                terminated: false,
                interrupted: false,
                failure: None,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues `item`, blocking while the queue is full.
    pub(crate) fn push(&self, item: T) -> TransportResult<()> {
        let mut state = self.lock();
        loop {
            if state.terminated {
                return Err(TransportError::Terminated);
            }
            if state.closed || state.failure.is_some() {
                return Err(TransportError::Closed);
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                self.readable.notify_one();
                return Ok(());
            }
            state = self
                .writable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Dequeues the next item, blocking until one arrives.
    ///
    /// Returns `Ok(None)` once the queue is closed and drained, or when the
    /// reader is interrupted. Termination wins over queued items.
    pub(crate) fn pop(&self) -> TransportResult<Option<T>> {
        let mut state = self.lock();
        loop {
            if state.terminated {
                return Err(TransportError::Terminated);
            }
            if let Some(item) = state.items.pop_front() {
                self.writable.notify_one();
                return Ok(Some(item));
            }
            if let Some((kind, ref message)) = state.failure {
                return Err(TransportError::Io(io::Error::new(kind, message.clone())));
            }
            if state.closed || state.interrupted {
                return Ok(None);
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Records a fault seen by the producer; readers get it after draining.
    pub(crate) fn fail(&self, error: &io::Error) {
        let mut state = self.lock();
        if state.failure.is_none() {
            state.failure = Some((error.kind(), error.to_string()));
        }
        self.readable.notify_all();
        self.writable.notify_all();
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }
}

impl<T: Send> Resource for Queue<T> {
    fn terminate(&self) {
        let mut state = self.lock();
        state.terminated = true;
        state.items.clear();
        self.readable.notify_all();
        self.writable.notify_all();
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.readable.notify_all();
        self.writable.notify_all();
    }

    fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupted = true;
        self.readable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = Queue::new(4);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.pop().unwrap(), Some(1));
        assert_eq!(queue.pop().unwrap(), Some(2));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let queue = Queue::new(4);
        queue.push("a").unwrap();
        queue.close();

        assert_eq!(queue.pop().unwrap(), Some("a"));
        assert_eq!(queue.pop().unwrap(), None);
        assert!(matches!(queue.push("b"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_terminate_wins_over_queued_items() {
        let queue = Queue::new(4);
        queue.push(1).unwrap();
        queue.terminate();
        assert!(matches!(queue.pop(), Err(TransportError::Terminated)));
    }

    #[test]
    fn test_terminate_wakes_blocked_reader() {
        let queue: Arc<Queue<u32>> = Arc::new(Queue::new(1));
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.terminate();
        assert!(matches!(reader.join().unwrap(), Err(TransportError::Terminated)));
    }

    #[test]
    fn test_interrupt_wakes_blocked_reader() {
        let queue: Arc<Queue<u32>> = Arc::new(Queue::new(1));
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.interrupt();
        assert_eq!(reader.join().unwrap().unwrap(), None);
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let queue = Arc::new(Queue::new(1));
        queue.push(1).unwrap();

        let writer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().unwrap(), Some(1));
        writer.join().unwrap().unwrap();
        assert_eq!(queue.pop().unwrap(), Some(2));
    }

    #[test]
    fn test_failure_surfaces_after_drain() {
        let queue = Queue::new(4);
        queue.push(7).unwrap();
        queue.fail(&io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        assert_eq!(queue.pop().unwrap(), Some(7));
        match queue.pop() {
            Err(TransportError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
