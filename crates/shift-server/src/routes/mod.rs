//! API route handlers.

pub mod files;
pub mod health;
pub mod orders;
pub mod tasks;
pub mod upload;
