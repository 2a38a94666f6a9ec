//! Service-oriented application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state and by the background loops.  It only holds `Arc`s and channel
//! handles, so cloning is cheap.

use std::sync::Arc;

use shift_convert::Converter;
use shift_core::config::Config;
use shift_db::pool::DbPool;
use shift_store::{ObjectStore, UrlSigner};

use crate::queue::DispatchQueue;

/// Application context shared by request handlers and background loops.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Object store for source and result files.
    pub store: Arc<dyn ObjectStore>,
    /// Document converter used by workers.
    pub converter: Arc<dyn Converter>,
    /// Signer for upload/download grants.
    pub signer: Arc<UrlSigner>,
    /// Producer side of the dispatch queue.
    pub queue: DispatchQueue,
}
