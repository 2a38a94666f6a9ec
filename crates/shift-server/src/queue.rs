//! Dispatch queue between the API and the worker pool.
//!
//! The database is the source of truth; the queue is only a wake-up
//! mechanism.  Delivery is at-least-once: on startup every `pending` row is
//! re-enqueued, so work survives a crash, and redelivered items are dropped
//! by the worker's claim CAS with no side effects.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use shift_core::{Result, TaskId, TaskType};
use shift_db::pool::DbPool;
use shift_db::queries::tasks;

/// A unit of work handed to the worker pool.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub task_id: TaskId,
    pub source_key: String,
    pub task_type: TaskType,
}

/// Producer handle. Held by the orchestrator and cloned into the context.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: UnboundedSender<WorkItem>,
}

impl DispatchQueue {
    /// Enqueue an item. Must be called only after the task row is committed.
    pub fn push(&self, item: WorkItem) {
        // Send fails only when all workers are gone, i.e. during shutdown;
        // the row stays pending and is re-enqueued on the next start.
        if self.tx.send(item).is_err() {
            tracing::warn!("Dispatch queue closed; item left pending for restart");
        }
    }
}

/// Consumer handle shared by all workers.
#[derive(Clone)]
pub struct WorkSource {
    rx: Arc<Mutex<UnboundedReceiver<WorkItem>>>,
}

impl WorkSource {
    /// Receive the next item, or `None` when the queue is closed.
    pub async fn recv(&self) -> Option<WorkItem> {
        self.rx.lock().await.recv().await
    }
}

/// Create a connected producer/consumer pair.
pub fn dispatch_queue() -> (DispatchQueue, WorkSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DispatchQueue { tx },
        WorkSource {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Re-enqueue every pending task (crash recovery, oldest first).
pub fn requeue_pending(db: &DbPool, queue: &DispatchQueue) -> Result<usize> {
    let conn = shift_db::pool::get_conn(db)?;
    let pending = tasks::list_pending(&conn)?;
    let count = pending.len();

    for task in pending {
        queue.push(WorkItem {
            task_id: task.task_id,
            source_key: task.source_key,
            task_type: task.task_type,
        });
    }

    Ok(count)
}
