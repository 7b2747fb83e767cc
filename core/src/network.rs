//! # Remote Hosts
//!
//! The contract the remote transport needs from a remote-shell connection:
//! copy a file over, run a command, hang up. [`ssh`] implements it with
//! `russh`; tests script it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use cmover_common::network::host::HostSpec;
use cmover_common::{MigrationError, Result};

use crate::progress::ProgressHandle;

pub mod ssh;

pub use ssh::SshConnector;

/// What a remote command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the server never sent an exit status.
    pub exit_status: Option<u32>,
    /// stdout and stderr, interleaved in arrival order.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

/// An authenticated connection to one host.
#[async_trait]
pub trait RemoteSession: Send {
    fn host(&self) -> &HostSpec;

    /// Copies `local` byte-for-byte to `remote`, returning the bytes sent.
    async fn upload(&mut self, local: &Path, remote: &str, progress: Arc<dyn ProgressHandle>) -> Result<u64>;

    /// Runs `command`. A non-zero exit is not an error at this level.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// Hangs up. Never fails; problems are logged.
    async fn close(self: Box<Self>);
}

/// Opens [`RemoteSession`]s.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn RemoteSession>>;
}

/// Runs `command` and turns a failed exit into [`MigrationError::RemoteCommandFailed`].
pub async fn run_checked(session: &mut dyn RemoteSession, command: &str) -> Result<String> {
    let host: String = session.host().to_string();
    let out: CommandOutput = session.exec(command).await?;

    if out.success() {
        return Ok(out.output);
    }

    let output: String = match out.exit_status {
        Some(code) if out.output.trim().is_empty() => format!("exit status {code}"),
        Some(code) => format!("exit status {code}: {}", out.output.trim()),
        None => format!("no exit status: {}", out.output.trim()),
    };
    Err(MigrationError::RemoteCommandFailed {
        host,
        command: command.to_string(),
        output,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
