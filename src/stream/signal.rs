//! One-shot signals
//!
//! A [`Signal`] transitions from not-set to set exactly once. Any number of
//! tasks can wait for the transition; waiters that arrive after it return
//! immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Single-fire event flag
#[derive(Debug, Default)]
pub struct Signal {
    set: AtomicBool,
    notify: Notify,
}

impl Signal {
    /// Create a signal in the not-set state
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake every waiter
    ///
    /// Returns `true` for the call that performed the transition and `false`
    /// for every later call.
    pub fn fire(&self) -> bool {
        if self
            .set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Check if the signal has been set
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Wait until the signal is set
    pub async fn wait(&self) {
        loop {
            // Register before checking so a concurrent fire() cannot slip between
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Wait until the signal is set or `cancel` fires
    pub async fn wait_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        if self.is_set() {
            return Ok(());
        }
        tokio::select! {
            _ = self.wait() => Ok(()),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
