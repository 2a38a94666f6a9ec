//! Task orchestration: submission gates, status queries, history, withdraw.
//!
//! Everything here runs synchronously against the database; the only async
//! boundary is the enqueue, which strictly happens after the insert commits.

use chrono::{DateTime, Utc};

use shift_core::{Error, Result, TaskId, TaskStatus, TaskType};
use shift_db::models::Task;
use shift_db::pool::get_conn;
use shift_db::queries::{orders, tasks};
use shift_store::ObjectStore;

use crate::context::AppContext;
use crate::queue::WorkItem;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Validated submission parameters.
#[derive(Debug)]
pub struct SubmitTask {
    pub client_id: String,
    pub file_name: String,
    /// Declared size in bytes.
    pub file_size: i64,
    pub source_key: String,
    pub task_type: TaskType,
}

/// Submit a new conversion task.
///
/// Gate order: field validation, absolute size limit, payment check.  A
/// rejected submission writes nothing.  On success the row is inserted as
/// `pending` and only then enqueued.
pub fn submit(ctx: &AppContext, req: SubmitTask, now: DateTime<Utc>) -> Result<Task> {
    if req.client_id.is_empty() {
        return Err(Error::Validation("client_id must not be empty".into()));
    }
    if req.file_name.is_empty() {
        return Err(Error::Validation("file_name must not be empty".into()));
    }
    if req.source_key.is_empty() {
        return Err(Error::Validation("source_key must not be empty".into()));
    }
    if req.file_size <= 0 {
        return Err(Error::Validation("file_size must be positive".into()));
    }

    let size_mb = req.file_size as f64 / BYTES_PER_MB;
    let limits = &ctx.config.limits;

    if size_mb > limits.max_file_size_mb as f64 {
        return Err(Error::FileTooLarge {
            size_mb,
            max_mb: limits.max_file_size_mb,
        });
    }

    let conn = get_conn(&ctx.db)?;
    let is_paid = orders::is_paid_for(&conn, &req.client_id, &req.source_key)?;

    if size_mb > limits.free_file_size_mb as f64 && !is_paid {
        return Err(Error::PaymentRequired {
            size_mb,
            free_mb: limits.free_file_size_mb,
        });
    }

    let expire_at = now + ctx.config.retention.window(is_paid);
    let task = tasks::create_task(
        &conn,
        &tasks::NewTask {
            client_id: &req.client_id,
            file_name: &req.file_name,
            file_size: req.file_size,
            source_key: &req.source_key,
            task_type: req.task_type,
            is_paid,
            created_at: now,
            expire_at,
        },
    )?;

    tracing::info!(
        task_id = %task.task_id,
        task_type = %task.task_type,
        size_mb = format!("{size_mb:.1}"),
        is_paid,
        "Task submitted"
    );

    ctx.queue.push(WorkItem {
        task_id: task.task_id,
        source_key: task.source_key.clone(),
        task_type: task.task_type,
    });

    Ok(task)
}

/// Look up a task, applying lazy expiry.
///
/// A row past its retention window is flipped to `expired` on read and
/// reported as [`Error::Expired`], which is distinct from [`Error::NotFound`].
pub fn query(ctx: &AppContext, task_id: TaskId, now: DateTime<Utc>) -> Result<Task> {
    let conn = get_conn(&ctx.db)?;
    let task =
        tasks::get_task(&conn, task_id)?.ok_or_else(|| Error::not_found("task", task_id))?;

    if task.status == TaskStatus::Expired {
        return Err(Error::Expired(task_id.to_string()));
    }

    if now > task.expire_at {
        tasks::force_expire(&conn, task_id)?;
        tracing::debug!(task_id = %task_id, "Task lazily expired on read");
        return Err(Error::Expired(task_id.to_string()));
    }

    Ok(task)
}

/// Paid task history for a client, newest first. `limit` is clamped to
/// 1..=50.
pub fn history(ctx: &AppContext, client_id: &str, limit: i64) -> Result<Vec<Task>> {
    if client_id.is_empty() {
        return Err(Error::Validation("client_id must not be empty".into()));
    }
    let limit = limit.clamp(1, 50);
    let conn = get_conn(&ctx.db)?;
    tasks::list_history(&conn, client_id, limit)
}

/// Withdraw a task: force it to `expired` and drop its backing objects.
///
/// Cooperative with in-flight workers: their terminal CAS will lose and
/// clean up after themselves.
pub fn withdraw(ctx: &AppContext, task_id: TaskId, client_id: &str) -> Result<()> {
    let conn = get_conn(&ctx.db)?;
    let task =
        tasks::get_task(&conn, task_id)?.ok_or_else(|| Error::not_found("task", task_id))?;

    if task.client_id != client_id {
        return Err(Error::not_found("task", task_id));
    }

    tasks::withdraw_task(&conn, task_id, client_id)?;
    tracing::info!(task_id = %task_id, "Task withdrawn");

    delete_objects(ctx, &task);
    Ok(())
}

/// Best-effort removal of a task's source and result objects.
pub(crate) fn delete_objects(ctx: &AppContext, task: &Task) {
    let mut keys = vec![task.source_key.as_str()];
    if let Some(ref result_key) = task.result_key {
        keys.push(result_key);
    }

    for key in keys {
        match ctx.store.delete(key) {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(task_id = %task.task_id, key, "Object delete failed: {e}");
            }
        }
    }
}
