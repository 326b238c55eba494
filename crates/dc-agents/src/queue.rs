//! Bounded task queue (§4.K): tracks in-flight task count against
//! `resilience.max_concurrent_tasks` and backs the worker pool with a
//! bounded `flume` channel.

use dc_core::types::Task;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub struct TaskQueue {
    sender: flume::Sender<Task>,
    receiver: flume::Receiver<Task>,
    active: Arc<AtomicU32>,
    max_concurrent: u32,
}

impl TaskQueue {
    pub fn new(capacity: u32, max_concurrent: u32) -> Self {
        let (sender, receiver) = flume::bounded(capacity.max(1) as usize);
        Self {
            sender,
            receiver,
            active: Arc::new(AtomicU32::new(0)),
            max_concurrent,
        }
    }

    /// Enqueue `task`, blocking asynchronously if the queue is full.
    pub async fn submit(&self, task: Task) -> Result<(), flume::SendError<Task>> {
        self.sender.send_async(task).await
    }

    pub fn receiver(&self) -> flume::Receiver<Task> {
        self.receiver.clone()
    }

    /// Reserve a worker slot, returning `false` if
    /// `max_concurrent_tasks` is already saturated.
    pub fn try_acquire(&self) -> bool {
        loop {
            let current = self.active.load(Ordering::Acquire);
            if current >= self.max_concurrent {
                return false;
            }
            if self
                .active
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release(&self) {
        self.active.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)).ok();
    }

    pub fn active_count(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}
