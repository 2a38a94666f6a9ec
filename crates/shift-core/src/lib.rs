//! shift-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other shift-* crates,
//! providing type-safe identifiers, the unified error type, the task domain
//! enums, the retention policy, and application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod task;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use task::{TaskStatus, TaskType};
