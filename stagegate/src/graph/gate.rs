//! Completion gates
//!
//! A gate counts the prerequisite edges of one (node, phase) pair that have
//! not signalled yet. It is armed while the graph is built and afterwards
//! only counted down; the decrement that reaches zero wakes every waiter.
//!
//! Arming takes `&mut self`, so the type system keeps increments out of the
//! execution phase: once gates are shared behind `&self` they can only go
//! down.

use crate::core::WaitFor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

/// Result of counting a gate down by one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Other prerequisites are still outstanding
    Pending,
    /// This was the last prerequisite, waiters were woken
    Opened,
    /// The gate was already open; the caller signalled more often than it was armed
    Underflow,
}

#[derive(Debug, Default)]
pub(crate) struct CompletionGate {
    remaining: AtomicUsize,
    opened: Notify,
    failed: Mutex<Vec<WaitFor>>,
}

impl CompletionGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds one outstanding prerequisite. Construction only.
    pub(crate) fn arm(&mut self) {
        *self.remaining.get_mut() += 1;
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Waits until every prerequisite has signalled.
    ///
    /// Returns the prerequisites that signalled a failure instead of a
    /// regular completion.
    pub(crate) async fn wait(&self) -> Vec<WaitFor> {
        loop {
            // Register before checking so a release in between is not lost
            let opened = self.opened.notified();
            if self.remaining() == 0 {
                break;
            }
            opened.await;
        }
        self.failed().clone()
    }

    /// Counts the gate down by one.
    ///
    /// A failed prerequisite is recorded under the same lock as the count
    /// drop, so a waiter released by this call always sees it. A release on
    /// an open gate records nothing.
    pub(crate) fn release(&self, failed: Option<&WaitFor>) -> Release {
        let mut recorded = self.failed();
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        if previous.is_ok() {
            if let Some(prerequisite) = failed {
                recorded.push(prerequisite.clone());
            }
        }
        drop(recorded);

        match previous {
            Ok(1) => {
                self.opened.notify_waiters();
                Release::Opened
            }
            Ok(_) => Release::Pending,
            Err(_) => Release::Underflow,
        }
    }

    fn failed(&self) -> std::sync::MutexGuard<'_, Vec<WaitFor>> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;
    use std::sync::Arc;
    use std::time::Duration;

    fn armed(count: usize) -> CompletionGate {
        let mut gate = CompletionGate::new();
        for _ in 0..count {
            gate.arm();
        }
        gate
    }

    #[tokio::test]
    async fn test_unarmed_gate_is_open() {
        let gate = CompletionGate::new();
        assert_eq!(gate.remaining(), 0);
        assert!(gate.wait().await.is_empty());
    }

    #[test]
    fn test_release_counts_down() {
        let gate = armed(2);
        assert_eq!(gate.release(None), Release::Pending);
        assert_eq!(gate.remaining(), 1);
        assert_eq!(gate.release(None), Release::Opened);
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn test_release_on_open_gate_does_not_wrap() {
        let gate = CompletionGate::new();
        assert_eq!(gate.release(None), Release::Underflow);
        assert_eq!(gate.remaining(), 0);
    }

    #[tokio::test]
    async fn test_waiters_released_by_last_signal() {
        let gate = Arc::new(armed(2));

        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.release(None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.release(None);
        let failed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn test_failed_prerequisite_is_reported() {
        let gate = armed(2);
        let failure = WaitFor::new("spine1", Phase::Healthy);

        gate.release(Some(&failure));
        gate.release(None);

        assert_eq!(gate.wait().await, vec![failure]);
    }

    #[tokio::test]
    async fn test_failure_on_open_gate_is_not_recorded() {
        let gate = armed(1);
        gate.release(None);

        let stray = WaitFor::new("spine1", Phase::Healthy);
        assert_eq!(gate.release(Some(&stray)), Release::Underflow);
        assert!(gate.wait().await.is_empty());
    }
}
