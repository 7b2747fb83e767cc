//! # Transport
//!
//! Gets an exported archive to where it can be imported.
//!
//! * [`LocalTransport`]: pipes export straight into import on this machine.
//! * [`RemoteTransport`]: stages the archive, uploads it and imports it on a
//!   remote host.

use std::sync::Arc;

use async_trait::async_trait;

use cmover_common::Result;
use cmover_common::migration::MigrationTask;

use crate::runtime::RuntimeAdapter;

pub mod local;
pub mod remote;

pub use local::LocalTransport;
pub use remote::RemoteTransport;

#[async_trait]
pub trait TransportStrategy: Send + Sync {
    /// Moves `task.image` using `adapter`, returning the imported identity.
    async fn transfer(&self, task: &MigrationTask, adapter: &RuntimeAdapter) -> Result<String>;
}

/// The pair of strategies a coordinator picks from.
#[derive(Clone)]
pub struct Transports {
    pub local: Arc<dyn TransportStrategy>,
    pub remote: Arc<dyn TransportStrategy>,
}

impl Transports {
    pub fn new(local: Arc<dyn TransportStrategy>, remote: Arc<dyn TransportStrategy>) -> Self {
        Self { local, remote }
    }

    /// Tasks with a host go remote.
    pub fn select(&self, task: &MigrationTask) -> &Arc<dyn TransportStrategy> {
        if task.is_local() {
            &self.local
        } else {
            &self.remote
        }
    }
}
