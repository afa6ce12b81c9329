//! Per-worker interrupt signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::queue::Resource;

#[derive(Default)]
struct InterruptInner {
    flag: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn Resource>>>,
}

/// Interrupt flag that also wakes the receive calls it is attached to.
///
/// Cloning shares the flag.
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

impl Interrupt {
    /// Create an unset interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every attached receiver.
    pub fn trigger(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        let waiters = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for waiter in waiters.iter().filter_map(Weak::upgrade) {
            waiter.interrupt();
        }
    }

    /// Whether the interrupt has been triggered.
    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn attach(&self, waiter: &Arc<dyn Resource>) {
        let mut waiters = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        waiters.retain(|w| w.strong_count() > 0);
        waiters.push(Arc::downgrade(waiter));
        if self.is_set() {
            waiter.interrupt();
        }
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt").field("set", &self.is_set()).finish()
    }
}
