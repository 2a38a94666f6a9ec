//! shift-convert: document conversion via external commands.
//!
//! The [`Converter`] trait is the seam between the worker executor and the
//! actual conversion tooling.  The shipped implementation,
//! [`CommandConverter`], shells out to a per-type command template; the
//! conversion algorithms themselves stay outside this codebase.

pub mod command;

pub use command::CommandConverter;

use async_trait::async_trait;
use std::path::Path;

use shift_core::{Result, TaskType};

/// Converts a source document at `input` into `output`.
///
/// Implementations must leave `output` absent on failure; the worker treats
/// a successful return as "output exists and is complete".
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, task_type: TaskType, input: &Path, output: &Path) -> Result<()>;
}
