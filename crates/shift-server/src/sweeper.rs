//! Retention sweeper.
//!
//! Periodically expires terminal tasks past their retention window and
//! hardens against crashed workers by also sweeping pending/processing rows
//! stalled well beyond any plausible conversion time.  Object deletion is
//! best-effort and never blocks the status transition.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use shift_core::Result;
use shift_db::pool::get_conn;
use shift_db::queries::tasks;

use crate::context::AppContext;
use crate::orchestrator::delete_objects;

/// Sweeper loop: one pass per configured interval until cancelled.
pub async fn run_sweeper(ctx: AppContext, cancel: CancellationToken) {
    let interval = Duration::from_secs(ctx.config.sweep.interval_mins * 60);
    tracing::info!(interval_mins = ctx.config.sweep.interval_mins, "Sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                match sweep(&ctx, Utc::now()) {
                    Ok(0) => {}
                    Ok(n) => tracing::info!("Sweep expired {n} tasks"),
                    Err(e) => tracing::error!("Sweep failed: {e}"),
                }
            }
        }
    }

    tracing::info!("Sweeper stopped");
}

/// One sweep pass at time `now`. Returns the number of tasks expired.
///
/// Idempotent: expired rows never reappear in either selection, and each
/// transition is a CAS from the observed status, so a concurrent withdraw
/// or worker write cannot be double-applied.
pub fn sweep(ctx: &AppContext, now: DateTime<Utc>) -> Result<usize> {
    let conn = get_conn(&ctx.db)?;
    let mut expired = 0;

    for task in tasks::list_expired(&conn, now)? {
        if tasks::expire_from(&conn, task.task_id, task.status)? {
            delete_objects(ctx, &task);
            expired += 1;
        }
    }

    let cutoff = now - chrono::Duration::hours(ctx.config.sweep.stall_hours);
    for task in tasks::list_stalled(&conn, cutoff)? {
        if tasks::expire_from(&conn, task.task_id, task.status)? {
            tracing::warn!(
                task_id = %task.task_id,
                status = %task.status,
                "Expired stalled task"
            );
            delete_objects(ctx, &task);
            expired += 1;
        }
    }

    Ok(expired)
}
