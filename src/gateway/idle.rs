// ABOUTME: Cancellable deferred task with reset-on-activity semantics.
// ABOUTME: Backs the gateway's idle disconnect.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Pending {
    id: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

/// At most one pending deferred action; scheduling replaces the previous one.
#[derive(Default)]
pub(crate) struct IdleTimer {
    pending: Arc<Mutex<Option<Pending>>>,
    next_id: AtomicU64,
}

impl IdleTimer {
    /// Run `on_fire` after `after` unless cancelled or rescheduled first.
    pub(crate) fn schedule<F>(&self, after: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let deadline = Instant::now() + after;
        let pending = Arc::clone(&self.pending);

        // Held across the spawn so the task cannot observe the slot before
        // its own entry is stored.
        let mut slot = self.pending.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Unregister before running so `cancel` from inside `on_fire`
            // does not abort this task.
            {
                let mut slot = pending.lock();
                match slot.as_ref() {
                    Some(current) if current.id == id => {
                        slot.take();
                    }
                    _ => return,
                }
            }
            on_fire.await;
        });

        if let Some(previous) = slot.replace(Pending { id, deadline, task }) {
            previous.task.abort();
        }
    }

    pub(crate) fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.task.abort();
        }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending.lock().as_ref().map(|p| p.deadline)
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
