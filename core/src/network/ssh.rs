//! # SSH
//!
//! [`RemoteConnector`] over `russh`.
//!
//! Files are copied by streaming them into `cat > PATH` on an exec channel,
//! so the remote host needs nothing beyond a POSIX shell.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use tokio::fs::File;
use tracing::{debug, warn};

use cmover_common::config::{AuthMethod, SshCredentials};
use cmover_common::network::host::HostSpec;
use cmover_common::{MigrationError, Result};

use super::{CommandOutput, RemoteConnector, RemoteSession};
use crate::progress::{ProgressHandle, ProgressReader};
use crate::runtime::shell_quote;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Accepts every host key, like `StrictHostKeyChecking=no`.
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens password or key authenticated SSH sessions.
#[derive(Debug, Clone)]
pub struct SshConnector {
    credentials: SshCredentials,
    timeout: Duration,
}

impl SshConnector {
    pub fn new(credentials: SshCredentials) -> Self {
        Self {
            credentials,
            timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn authenticate(&self, handle: &mut Handle<AcceptAnyHostKey>, host: &str) -> Result<()> {
        let failed = |reason: String| MigrationError::RemoteConnectFailed {
            host: host.to_string(),
            reason,
        };
        let user: &str = &self.credentials.user;

        let accepted: bool = match self.credentials.auth_method() {
            Some(AuthMethod::Password(password)) => {
                debug!(host, user, "authenticating with password");
                handle
                    .authenticate_password(user, password)
                    .await
                    .map_err(|e| failed(e.to_string()))?
            }
            Some(AuthMethod::PrivateKey { path, passphrase }) => {
                debug!(host, user, key = %path.display(), "authenticating with private key");
                let key = russh_keys::load_secret_key(path, passphrase)
                    .map_err(|e| failed(format!("cannot load key {}: {e}", path.display())))?;
                handle
                    .authenticate_publickey(user, Arc::new(key))
                    .await
                    .map_err(|e| failed(e.to_string()))?
            }
            None => return Err(failed("no password or private key configured".to_string())),
        };

        if accepted {
            Ok(())
        } else {
            Err(failed(format!("authentication rejected for user '{user}'")))
        }
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(&self, host: &HostSpec) -> Result<Box<dyn RemoteSession>> {
        let name: String = host.to_string();
        let config = Arc::new(client::Config::default());

        let connecting = client::connect(config, host.socket_addr(), AcceptAnyHostKey);
        let mut handle = tokio::time::timeout(self.timeout, connecting)
            .await
            .map_err(|_| MigrationError::RemoteConnectFailed {
                host: name.clone(),
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| MigrationError::RemoteConnectFailed {
                host: name.clone(),
                reason: e.to_string(),
            })?;

        self.authenticate(&mut handle, &name).await?;
        debug!(host = %name, "ssh session established");

        Ok(Box::new(SshSession { host: *host, handle }))
    }
}

/// One authenticated SSH connection; every operation opens its own channel.
pub struct SshSession {
    host: HostSpec,
    handle: Handle<AcceptAnyHostKey>,
}

impl SshSession {
    fn command_failed(&self, command: &str, reason: impl ToString) -> MigrationError {
        MigrationError::RemoteCommandFailed {
            host: self.host.to_string(),
            command: command.to_string(),
            output: reason.to_string(),
        }
    }
}

/// Reads a channel until it closes, collecting output and the exit status.
async fn drain_channel(channel: &mut russh::Channel<client::Msg>) -> CommandOutput {
    let mut output: Vec<u8> = Vec::new();
    let mut exit_status: Option<u32> = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => output.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, .. } => output.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            _ => {}
        }
    }

    CommandOutput {
        exit_status,
        output: String::from_utf8_lossy(&output).into_owned(),
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &HostSpec {
        &self.host
    }

    async fn upload(&mut self, local: &Path, remote: &str, progress: Arc<dyn ProgressHandle>) -> Result<u64> {
        let upload_failed = |reason: String| MigrationError::UploadFailed {
            host: self.host.to_string(),
            path: remote.to_string(),
            reason,
        };

        let file: File = File::open(local)
            .await
            .map_err(|e| upload_failed(format!("cannot open {}: {e}", local.display())))?;
        let size: u64 = file
            .metadata()
            .await
            .map_err(|e| upload_failed(e.to_string()))?
            .len();

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        channel
            .exec(true, format!("cat > {}", shell_quote(remote)))
            .await
            .map_err(|e| upload_failed(e.to_string()))?;

        channel
            .data(ProgressReader::new(file, size, progress))
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        channel.eof().await.map_err(|e| upload_failed(e.to_string()))?;

        let out: CommandOutput = drain_channel(&mut channel).await;
        if !out.success() {
            return Err(upload_failed(format!(
                "remote write exited with {:?}: {}",
                out.exit_status,
                out.output.trim()
            )));
        }

        Ok(size)
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.command_failed(command, e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| self.command_failed(command, e))?;

        Ok(drain_channel(&mut channel).await)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(host = %self.host, "ssh disconnect failed: {e}");
        }
    }
}
