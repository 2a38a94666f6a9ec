//! shift-store: object storage for source and result files.
//!
//! Provides the [`ObjectStore`] trait, a local filesystem implementation,
//! and HMAC-signed URL grants so clients can upload and download without
//! the API proxying bytes through authenticated endpoints.

pub mod local;
pub mod signing;

pub use local::LocalStore;
pub use signing::UrlSigner;

use shift_core::Result;

/// Keyed blob storage for task source and result files.
///
/// Keys are flat, `/`-separated paths like `uploads/<uuid>.pdf`.
pub trait ObjectStore: Send + Sync {
    /// Read an object in full. `NotFound` if the key does not exist.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write an object, replacing any existing one under the same key.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete an object. `NotFound` if the key does not exist.
    fn delete(&self, key: &str) -> Result<()>;
}
