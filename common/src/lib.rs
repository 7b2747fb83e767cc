//! # cmover common
//!
//! Models shared by every crate in the workspace: the migration error taxonomy,
//! the per-invocation [`config::Config`], host targets and the task/result types
//! the coordinator passes around.

pub mod config;
pub mod error;
pub mod migration;
pub mod network;

pub use error::{MigrationError, Result};
