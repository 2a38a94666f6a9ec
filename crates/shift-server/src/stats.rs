//! Hourly task statistics reporter.
//!
//! Read-only loop logging a per-status breakdown of tasks created in the
//! trailing hour.  Purely observational; no table writes.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use shift_db::pool::get_conn;
use shift_db::queries::tasks;

use crate::context::AppContext;

const REPORT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Stats loop: log hourly counts until cancelled.
pub async fn run_stats(ctx: AppContext, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(REPORT_INTERVAL) => report(&ctx),
        }
    }
}

fn report(ctx: &AppContext) {
    let counts = get_conn(&ctx.db)
        .and_then(|conn| tasks::status_counts_since(&conn, Utc::now() - chrono::Duration::hours(1)));

    match counts {
        Ok(counts) => {
            let summary = counts
                .iter()
                .map(|(status, n)| format!("{status}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::info!("Hourly task stats: {}", if summary.is_empty() { "none" } else { &summary });
        }
        Err(e) => tracing::warn!("Failed to collect hourly stats: {e}"),
    }
}
