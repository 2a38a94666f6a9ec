//! Worker executor: claims tasks, runs conversions, records outcomes.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use shift_convert::Converter;
use shift_core::{Error, Result};
use shift_db::models::Task;
use shift_db::pool::get_conn;
use shift_db::queries::tasks;
use shift_store::ObjectStore;

use crate::context::AppContext;
use crate::queue::{WorkItem, WorkSource};

/// Ceiling for exponential backoff between transient-fault retries.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Worker loop: pull items until cancelled or the queue closes.
pub async fn run_worker(
    ctx: AppContext,
    source: WorkSource,
    worker_id: usize,
    cancel: CancellationToken,
) {
    tracing::info!(worker_id, "Worker started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = source.recv() => {
                let Some(item) = item else { break };
                let task_id = item.task_id;
                if let Err(e) = process_item(&ctx, item).await {
                    tracing::error!(worker_id, task_id = %task_id, "Worker error: {e}");
                }
            }
        }
    }

    tracing::info!(worker_id, "Worker stopped");
}

/// Process one queue item end to end.
///
/// The claim CAS is the mutual-exclusion point: if the task is no longer
/// `pending` (already claimed, withdrawn, or swept) the item is dropped
/// with no side effects, which makes redelivery harmless.
pub async fn process_item(ctx: &AppContext, item: WorkItem) -> Result<()> {
    let claimed = {
        let conn = get_conn(&ctx.db)?;
        tasks::claim_task(&conn, item.task_id)?
    };

    let Some(task) = claimed else {
        tracing::debug!(task_id = %item.task_id, "Skipping stale delivery");
        return Ok(());
    };

    tracing::info!(task_id = %task.task_id, task_type = %task.task_type, "Processing task");

    match execute(ctx, &task).await {
        Ok(result_key) => {
            let conn = get_conn(&ctx.db)?;
            let won = tasks::complete_task(&conn, task.task_id, &result_key, Utc::now())?;
            if won {
                tracing::info!(task_id = %task.task_id, result_key, "Task completed");
            } else {
                // The task was withdrawn or swept mid-flight; the row is
                // authoritative, so the uploaded result is an orphan.
                tracing::info!(task_id = %task.task_id, "Terminal CAS lost; discarding result");
                if let Err(e) = ctx.store.delete(&result_key) {
                    tracing::warn!(task_id = %task.task_id, "Orphan result cleanup failed: {e}");
                }
            }
        }
        Err(e) => {
            let conn = get_conn(&ctx.db)?;
            let won = tasks::fail_task(&conn, task.task_id, &e.to_string(), Utc::now())?;
            if won {
                tracing::warn!(task_id = %task.task_id, "Task failed: {e}");
            } else {
                tracing::debug!(task_id = %task.task_id, "Failure CAS lost: {e}");
            }
        }
    }

    Ok(())
}

/// Run the conversion for a claimed task and return the result object key.
async fn execute(ctx: &AppContext, task: &Task) -> Result<String> {
    let worker_cfg = &ctx.config.worker;

    let source = with_retry(worker_cfg.max_retries, || ctx.store.get(&task.source_key)).await?;

    let workdir = tempfile::tempdir()?;
    let input_ext = Path::new(&task.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf");
    let input = workdir.path().join(format!("source.{input_ext}"));
    let output_ext = task.task_type.output_extension();
    let output = workdir.path().join(format!("result.{output_ext}"));

    std::fs::write(&input, &source)?;
    drop(source);

    let started = std::time::Instant::now();
    let hard = Duration::from_secs(worker_cfg.hard_timeout_mins * 60);

    let converted = tokio::time::timeout(
        hard,
        ctx.converter.convert(task.task_type, &input, &output),
    )
    .await;

    match converted {
        Ok(result) => result?,
        Err(_elapsed) => {
            return Err(Error::Timeout {
                minutes: worker_cfg.hard_timeout_mins,
            });
        }
    }

    let elapsed = started.elapsed();
    let soft = Duration::from_secs(worker_cfg.soft_timeout_mins * 60);
    if elapsed > soft {
        tracing::warn!(
            task_id = %task.task_id,
            elapsed_secs = elapsed.as_secs(),
            "Conversion exceeded the soft time budget"
        );
    }

    let result_bytes = std::fs::read(&output)?;
    let result_key = format!("results/{}.{output_ext}", task.task_id);
    with_retry(worker_cfg.max_retries, || {
        ctx.store.put(&result_key, &result_bytes)
    })
    .await?;

    Ok(result_key)
}

/// Retry `op` on transient infrastructure faults with exponential backoff.
async fn with_retry<T, F>(max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Transient fault (attempt {}/{max_retries}): {e}; retrying in {delay:?}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(20), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn retry_gives_up_on_domain_errors() {
        let mut calls = 0;
        let result: Result<()> = with_retry(3, || {
            calls += 1;
            Err(Error::conversion("bad page"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_transient_budget() {
        let mut calls = 0;
        let result: Result<()> = with_retry(2, || {
            calls += 1;
            Err(Error::storage("disk gone"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_fault() {
        let mut calls = 0;
        let result = with_retry(3, || {
            calls += 1;
            if calls < 3 {
                Err(Error::storage("flaky"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
