//! Task lifecycle operations.
//!
//! All status transitions are compare-and-set updates keyed on the current
//! status, so concurrent writers (workers, the sweeper, withdraw requests)
//! cannot double-apply a transition.  Functions returning `Result<bool>`
//! report whether the CAS won.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use shift_core::{Error, Result, TaskId, TaskStatus, TaskType};

use crate::models::{fmt_ts, Task};

const COLS: &str = "task_id, client_id, file_name, file_size, source_key,
    result_key, task_type, status, is_paid, error_msg,
    created_at, completed_at, expire_at";

/// Parameters for inserting a new task.
///
/// `expire_at` is computed by the caller from the retention policy and is
/// never touched again after the insert.
#[derive(Debug)]
pub struct NewTask<'a> {
    pub client_id: &'a str,
    pub file_name: &'a str,
    pub file_size: i64,
    pub source_key: &'a str,
    pub task_type: TaskType,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

/// Insert a new task in `pending` state.
pub fn create_task(conn: &Connection, new: &NewTask) -> Result<Task> {
    let task_id = TaskId::new();

    conn.execute(
        "INSERT INTO tasks (task_id, client_id, file_name, file_size, source_key,
             task_type, status, is_paid, created_at, expire_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9)",
        rusqlite::params![
            task_id.to_string(),
            new.client_id,
            new.file_name,
            new.file_size,
            new.source_key,
            new.task_type.to_string(),
            new.is_paid,
            fmt_ts(new.created_at),
            fmt_ts(new.expire_at),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Task {
        task_id,
        client_id: new.client_id.to_string(),
        file_name: new.file_name.to_string(),
        file_size: new.file_size,
        source_key: new.source_key.to_string(),
        result_key: None,
        task_type: new.task_type,
        status: TaskStatus::Pending,
        is_paid: new.is_paid,
        error_msg: None,
        created_at: new.created_at,
        completed_at: None,
        expire_at: new.expire_at,
    })
}

/// Get a task by ID.
pub fn get_task(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let q = format!("SELECT {COLS} FROM tasks WHERE task_id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Task::from_row);
    match result {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Paid task history for a client, newest first.
pub fn list_history(conn: &Connection, client_id: &str, limit: i64) -> Result<Vec<Task>> {
    let q = format!(
        "SELECT {COLS} FROM tasks
         WHERE client_id = ?1 AND is_paid = 1
         ORDER BY created_at DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![client_id, limit], Task::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Atomically claim a pending task for processing.
///
/// Returns `None` if the task does not exist or is no longer `pending`;
/// redelivered queue items land here and are dropped with no side effects.
pub fn claim_task(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    // SQLite RETURNING is supported since 3.35.
    let q = format!(
        "UPDATE tasks SET status = 'processing'
         WHERE task_id = ?1 AND status = 'pending'
         RETURNING {COLS}"
    );
    let result = conn.query_row(&q, [id.to_string()], Task::from_row);
    match result {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Mark a processing task completed, recording the result object key.
///
/// Returns `false` if the task left `processing` in the meantime (withdrawn
/// or swept); the caller must then discard the uploaded result.
pub fn complete_task(
    conn: &Connection,
    id: TaskId,
    result_key: &str,
    completed_at: DateTime<Utc>,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tasks SET status = 'completed', result_key = ?1, completed_at = ?2
             WHERE task_id = ?3 AND status = 'processing'",
            rusqlite::params![result_key, fmt_ts(completed_at), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a processing task failed with a diagnostic message.
pub fn fail_task(
    conn: &Connection,
    id: TaskId,
    error_msg: &str,
    completed_at: DateTime<Utc>,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tasks SET status = 'failed', error_msg = ?1, completed_at = ?2
             WHERE task_id = ?3 AND status = 'processing'",
            rusqlite::params![error_msg, fmt_ts(completed_at), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Client-initiated withdrawal: force the task to `expired`.
///
/// Matches on `(task_id, client_id)` regardless of status; an in-flight
/// worker's later terminal CAS simply loses.  Returns `false` when no such
/// task belongs to the client.
pub fn withdraw_task(conn: &Connection, id: TaskId, client_id: &str) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tasks SET status = 'expired'
             WHERE task_id = ?1 AND client_id = ?2",
            rusqlite::params![id.to_string(), client_id],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Expire a task from a known previous status (sweeper CAS).
pub fn expire_from(conn: &Connection, id: TaskId, prev: TaskStatus) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tasks SET status = 'expired'
             WHERE task_id = ?1 AND status = ?2",
            rusqlite::params![id.to_string(), prev.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Expire a task from any non-expired status (lazy expiry on read).
pub fn force_expire(conn: &Connection, id: TaskId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE tasks SET status = 'expired'
             WHERE task_id = ?1 AND status != 'expired'",
            [id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Terminal tasks whose retention window has passed.
pub fn list_expired(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Task>> {
    let q = format!(
        "SELECT {COLS} FROM tasks
         WHERE status IN ('completed', 'failed') AND expire_at < ?1"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([fmt_ts(now)], Task::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Pending or processing tasks created before `cutoff`.
///
/// These are assumed to belong to a crashed worker and get swept.
pub fn list_stalled(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<Task>> {
    let q = format!(
        "SELECT {COLS} FROM tasks
         WHERE status IN ('pending', 'processing') AND created_at < ?1"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([fmt_ts(cutoff)], Task::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// All pending tasks, oldest first (startup re-enqueue).
pub fn list_pending(conn: &Connection) -> Result<Vec<Task>> {
    let q = format!(
        "SELECT {COLS} FROM tasks WHERE status = 'pending' ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Task::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Count tasks by status created since `since`.
pub fn status_counts_since(
    conn: &Connection,
    since: DateTime<Utc>,
) -> Result<Vec<(TaskStatus, i64)>> {
    let mut stmt = conn
        .prepare(
            "SELECT status, COUNT(*) FROM tasks
             WHERE created_at >= ?1 GROUP BY status ORDER BY status",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([fmt_ts(since)], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    rows.into_iter()
        .map(|(s, n)| {
            s.parse::<TaskStatus>()
                .map(|status| (status, n))
                .map_err(Error::Internal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    fn sample<'a>(client_id: &'a str, now: DateTime<Utc>) -> NewTask<'a> {
        NewTask {
            client_id,
            file_name: "report.pdf",
            file_size: 1024,
            source_key: "uploads/report.pdf",
            task_type: TaskType::Pdf2Word,
            is_paid: false,
            created_at: now,
            expire_at: now + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();
        let task = create_task(&conn, &sample("c1", now)).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let found = get_task(&conn, task.task_id).unwrap().unwrap();
        assert_eq!(found.file_name, "report.pdf");
        assert_eq!(found.task_type, TaskType::Pdf2Word);
        assert_eq!(found.expire_at, task.expire_at);
    }

    #[test]
    fn get_missing_is_none() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        assert!(get_task(&conn, TaskId::new()).unwrap().is_none());
    }

    #[test]
    fn claim_is_exclusive() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let task = create_task(&conn, &sample("c1", Utc::now())).unwrap();

        let claimed = claim_task(&conn, task.task_id).unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Processing);

        // redelivery: second claim finds no pending row
        assert!(claim_task(&conn, task.task_id).unwrap().is_none());
    }

    #[test]
    fn complete_requires_processing() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();
        let task = create_task(&conn, &sample("c1", now)).unwrap();

        // not yet claimed
        assert!(!complete_task(&conn, task.task_id, "out/x.docx", now).unwrap());

        claim_task(&conn, task.task_id).unwrap().unwrap();
        assert!(complete_task(&conn, task.task_id, "out/x.docx", now).unwrap());

        let done = get_task(&conn, task.task_id).unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result_key.as_deref(), Some("out/x.docx"));
        assert!(done.completed_at.is_some());

        // terminal states are sticky
        assert!(!fail_task(&conn, task.task_id, "late", now).unwrap());
    }

    #[test]
    fn fail_records_message() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();
        let task = create_task(&conn, &sample("c1", now)).unwrap();
        claim_task(&conn, task.task_id).unwrap().unwrap();

        assert!(fail_task(&conn, task.task_id, "converter exited 1", now).unwrap());
        let failed = get_task(&conn, task.task_id).unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error_msg.as_deref(), Some("converter exited 1"));
    }

    #[test]
    fn withdraw_beats_inflight_worker() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();
        let task = create_task(&conn, &sample("c1", now)).unwrap();
        claim_task(&conn, task.task_id).unwrap().unwrap();

        assert!(withdraw_task(&conn, task.task_id, "c1").unwrap());
        let gone = get_task(&conn, task.task_id).unwrap().unwrap();
        assert_eq!(gone.status, TaskStatus::Expired);

        // the worker's terminal CAS loses
        assert!(!complete_task(&conn, task.task_id, "out/x.docx", now).unwrap());
    }

    #[test]
    fn withdraw_wrong_client_is_noop() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let task = create_task(&conn, &sample("c1", Utc::now())).unwrap();
        assert!(!withdraw_task(&conn, task.task_id, "c2").unwrap());
    }

    #[test]
    fn history_is_paid_only_and_newest_first() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        let mut old_paid = sample("c1", now - chrono::Duration::minutes(10));
        old_paid.is_paid = true;
        old_paid.file_name = "old.pdf";
        create_task(&conn, &old_paid).unwrap();

        let mut new_paid = sample("c1", now);
        new_paid.is_paid = true;
        new_paid.file_name = "new.pdf";
        create_task(&conn, &new_paid).unwrap();

        create_task(&conn, &sample("c1", now)).unwrap(); // free, excluded
        let mut other = sample("c2", now);
        other.is_paid = true;
        create_task(&conn, &other).unwrap(); // other client

        let history = list_history(&conn, "c1", 50).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].file_name, "new.pdf");
        assert_eq!(history[1].file_name, "old.pdf");

        let limited = list_history(&conn, "c1", 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn expired_selection_and_cas() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        let mut past = sample("c1", now - chrono::Duration::hours(2));
        past.expire_at = now - chrono::Duration::hours(1);
        let task = create_task(&conn, &past).unwrap();
        claim_task(&conn, task.task_id).unwrap().unwrap();
        complete_task(&conn, task.task_id, "out/x.docx", now).unwrap();

        let expired = list_expired(&conn, now).unwrap();
        assert_eq!(expired.len(), 1);
        assert!(expire_from(&conn, task.task_id, TaskStatus::Completed).unwrap());

        // idempotent: gone from the selection, CAS no-ops
        assert!(list_expired(&conn, now).unwrap().is_empty());
        assert!(!expire_from(&conn, task.task_id, TaskStatus::Completed).unwrap());
    }

    #[test]
    fn stalled_selection() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        let stalled = create_task(&conn, &sample("c1", now - chrono::Duration::hours(3))).unwrap();
        create_task(&conn, &sample("c1", now)).unwrap(); // fresh, kept

        let cutoff = now - chrono::Duration::hours(2);
        let found = list_stalled(&conn, cutoff).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_id, stalled.task_id);
    }

    #[test]
    fn force_expire_any_status() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let task = create_task(&conn, &sample("c1", Utc::now())).unwrap();

        assert!(force_expire(&conn, task.task_id).unwrap());
        assert!(!force_expire(&conn, task.task_id).unwrap());
    }

    #[test]
    fn pending_listing_is_fifo() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        let first = create_task(&conn, &sample("c1", now - chrono::Duration::minutes(5))).unwrap();
        let second = create_task(&conn, &sample("c1", now)).unwrap();

        let pending = list_pending(&conn).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].task_id, first.task_id);
        assert_eq!(pending[1].task_id, second.task_id);
    }

    #[test]
    fn counts_by_status() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let now = Utc::now();

        create_task(&conn, &sample("c1", now)).unwrap();
        let claimed = create_task(&conn, &sample("c1", now)).unwrap();
        claim_task(&conn, claimed.task_id).unwrap().unwrap();

        let counts = status_counts_since(&conn, now - chrono::Duration::hours(1)).unwrap();
        let pending = counts.iter().find(|(s, _)| *s == TaskStatus::Pending);
        let processing = counts.iter().find(|(s, _)| *s == TaskStatus::Processing);
        assert_eq!(pending.map(|(_, n)| *n), Some(1));
        assert_eq!(processing.map(|(_, n)| *n), Some(1));
    }
}
