//! # cmover core
//!
//! The migration engine.
//!
//! * [`runtime`]: export/import capabilities per runtime and the registry
//!   keyed by `(source, destination)`.
//! * [`progress`]: a read-through byte counter and the sinks it reports to.
//! * [`transport`]: local (pipe) and remote (stage, upload, import) delivery.
//! * [`network`]: the remote session contract and its SSH implementation.
//! * [`coordinator`]: fans tasks out, bounds concurrency and aggregates results.

pub mod coordinator;
pub mod network;
pub mod progress;
pub mod runtime;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::Coordinator;
pub use runtime::{AdapterRegistry, ArchiveStream, RuntimeAdapter};
