use std::fmt;
use std::path::{Path, PathBuf};

use crate::migration::{self, MigrationTask, RuntimeKind};
use crate::network::host::HostSpec;

pub const DEFAULT_NAMESPACE: &str = "k8s.io";
pub const DEFAULT_CONTAINERD_ADDRESS: &str = "/run/containerd/containerd.sock";
pub const DEFAULT_REMOTE_DIR: &str = "/tmp";

/// How the coordinator surfaces task failures to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Wait for every task and hand back the full report.
    #[default]
    DrainAll,
    /// Wait for every task but only surface the first error seen.
    FailVisible,
}

/// Credentials used for every remote host in a run.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SshCredentials {
    pub user: String,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub key_passphrase: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod<'a> {
    Password(&'a str),
    PrivateKey {
        path: &'a Path,
        passphrase: Option<&'a str>,
    },
}

impl SshCredentials {
    /// A non-empty password wins, otherwise the private key is used.
    pub fn auth_method(&self) -> Option<AuthMethod<'_>> {
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            return Some(AuthMethod::Password(password));
        }
        self.private_key.as_deref().map(|path| AuthMethod::PrivateKey {
            path,
            passphrase: self.key_passphrase.as_deref().filter(|p| !p.is_empty()),
        })
    }
}

impl fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field("key_passphrase", &self.key_passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Settings for one invocation, built once by the front end.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: RuntimeKind,
    pub destination: RuntimeKind,
    /// Namespace the destination registers images under.
    pub namespace: String,
    /// Remote targets. Empty means migrate on this machine.
    pub hosts: Vec<HostSpec>,
    pub ssh: SshCredentials,
    /// Upper bound on tasks in flight. `None` runs one worker per task.
    pub max_concurrency: Option<usize>,
    pub mode: DispatchMode,
    /// Socket handed to `ctr --address`.
    pub containerd_address: PathBuf,
    /// Directory on the remote host where archives are uploaded.
    pub remote_dir: String,
    /// Local directory for staged archives, system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: RuntimeKind::Docker,
            destination: RuntimeKind::Containerd,
            namespace: DEFAULT_NAMESPACE.to_string(),
            hosts: Vec::new(),
            ssh: SshCredentials::default(),
            max_concurrency: None,
            mode: DispatchMode::default(),
            containerd_address: PathBuf::from(DEFAULT_CONTAINERD_ADDRESS),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            staging_dir: None,
            show_progress: true,
        }
    }
}

impl Config {
    /// Expands `images` against the configured hosts.
    pub fn tasks_for<S: AsRef<str>>(&self, images: &[S]) -> Vec<MigrationTask> {
        migration::build_tasks(
            self.source,
            self.destination,
            &self.namespace,
            images,
            &self.hosts,
        )
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
