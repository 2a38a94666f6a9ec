//! Query modules, one per entity.

pub mod orders;
pub mod tasks;
