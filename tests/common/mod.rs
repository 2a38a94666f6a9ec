//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, a temp-dir
//! object store, a `cp`-based converter, and a full `AppContext`.  The
//! [`TestHarness::with_server`] constructor starts Axum on a random port
//! for HTTP-level testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use shift_convert::CommandConverter;
use shift_core::config::Config;
use shift_core::{TaskType, TaskId};
use shift_db::models::Task;
use shift_db::pool::{init_memory_pool, DbPool};
use shift_server::context::AppContext;
use shift_server::queue::{dispatch_queue, WorkSource};
use shift_server::router::build_router;
use shift_store::{LocalStore, ObjectStore, UrlSigner};

/// Test harness wrapping a fully-constructed `AppContext` backed by an
/// in-memory database and a temp-dir store.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub source: WorkSource,
    _store_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration.
    ///
    /// Every task type is wired to a `cp` command so conversions complete
    /// instantly without external tooling.
    pub fn with_config(mut config: Config) -> Self {
        for tt in TaskType::all() {
            config
                .convert
                .commands
                .entry(tt)
                .or_insert_with(|| "cp {input} {output}".to_string());
        }
        Self::with_config_sparse(config)
    }

    /// Create a harness using the configuration exactly as given, without
    /// filling in convert commands.
    pub fn with_config_sparse(config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let store_dir = tempfile::tempdir().expect("failed to create store dir");
        let store = Arc::new(LocalStore::new(store_dir.path()).expect("failed to create store"));
        let signer = Arc::new(UrlSigner::new("test-secret", config.storage.url_ttl_secs));
        let converter = Arc::new(CommandConverter::new(config.convert.commands.clone()));
        let (queue, source) = dispatch_queue();

        let ctx = AppContext {
            db: db.clone(),
            config: Arc::new(config),
            store,
            converter,
            signer,
            queue,
        };

        Self {
            ctx,
            db,
            source,
            _store_dir: store_dir,
        }
    }

    /// Start an Axum server on a random port and return the harness
    /// together with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> shift_db::pool::PooledConnection {
        shift_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }

    /// Seed the store and submit a free-tier task for `client_id`.
    pub fn submit_small(&self, client_id: &str) -> Task {
        self.submit_at(client_id, 1024, Utc::now())
    }

    /// Seed the store and submit a task with an explicit size and clock.
    pub fn submit_at(&self, client_id: &str, file_size: i64, now: DateTime<Utc>) -> Task {
        let source_key = format!("uploads/{}.pdf", uuid::Uuid::new_v4());
        self.ctx
            .store
            .put(&source_key, b"%PDF-1.7 test document")
            .expect("failed to seed source object");

        shift_server::orchestrator::submit(
            &self.ctx,
            shift_server::orchestrator::SubmitTask {
                client_id: client_id.to_string(),
                file_name: "document.pdf".to_string(),
                file_size,
                source_key,
                task_type: TaskType::Pdf2Word,
            },
            now,
        )
        .expect("submit failed")
    }

    /// Drain one queue item and run it through the worker path.
    pub async fn work_one(&self) {
        let item = self.source.recv().await.expect("queue empty");
        shift_server::worker::process_item(&self.ctx, item)
            .await
            .expect("worker error");
    }

    /// Fetch a task row directly.
    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        shift_db::queries::tasks::get_task(&self.conn(), id).expect("get_task failed")
    }

    /// Total number of task rows.
    pub fn task_count(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .expect("count failed")
    }

    /// Create and pay an order so the payment gate passes.
    pub fn pay_for(&self, client_id: &str, source_key: &str) {
        let conn = self.conn();
        let order = shift_db::queries::orders::create_order(
            &conn,
            client_id,
            source_key,
            499,
            Utc::now(),
        )
        .expect("create_order failed");
        shift_db::queries::orders::mark_paid(&conn, order.order_id, Utc::now())
            .expect("mark_paid failed");
    }

    /// Rewrite a task's expiry so it is already past.
    pub fn backdate_expiry(&self, id: TaskId, by: Duration) {
        let expire_at = (Utc::now() - by).to_rfc3339();
        self.conn()
            .execute(
                "UPDATE tasks SET expire_at = ?1 WHERE task_id = ?2",
                rusqlite::params![expire_at, id.to_string()],
            )
            .expect("backdate failed");
    }
}
