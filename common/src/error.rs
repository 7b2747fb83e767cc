//! Error taxonomy for a migration run.

use crate::migration::RuntimeKind;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Everything that can go wrong while moving an image.
///
/// Variants carry owned context so a failure can be stored inside a
/// [`crate::migration::MigrationResult`] and cloned out of a report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// A host token did not parse as an IPv4/IPv6 literal, range or port.
    #[error("invalid address '{token}': {reason}")]
    InvalidAddress { token: String, reason: String },

    /// The source runtime has no image under this reference.
    #[error("image '{image}' not found in {runtime}")]
    ImageNotFound { runtime: RuntimeKind, image: String },

    /// No adapter can move images between these runtimes.
    #[error("migration from {from} to {to} is not supported")]
    UnsupportedDestination { from: RuntimeKind, to: RuntimeKind },

    /// Listing the source runtime's images failed.
    #[error("failed to list images in {runtime}: {reason}")]
    ImageListFailed { runtime: RuntimeKind, reason: String },

    #[error("failed to export image '{image}': {reason}")]
    ExportFailed { image: String, reason: String },

    #[error("failed to import image '{image}': {reason}")]
    ImportFailed { image: String, reason: String },

    #[error("failed to connect to {host}: {reason}")]
    RemoteConnectFailed { host: String, reason: String },

    /// Copying the staged archive to the remote host failed.
    #[error("failed to upload '{path}' to {host}: {reason}")]
    UploadFailed {
        host: String,
        path: String,
        reason: String,
    },

    /// The remote command exited non-zero or could not be run.
    #[error("command '{command}' failed on {host}: {output}")]
    RemoteCommandFailed {
        host: String,
        command: String,
        output: String,
    },

    /// Non-fatal: the remote temporary archive could not be removed.
    #[error("could not remove '{path}' on {host}: {reason}")]
    CleanupWarning {
        host: String,
        path: String,
        reason: String,
    },

    /// The worker running this task died before reporting.
    #[error("migration of '{image}' aborted: {reason}")]
    TaskAborted { image: String, reason: String },
}

impl MigrationError {
    pub fn invalid_address(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    pub fn export_failed(image: &str, reason: impl ToString) -> Self {
        Self::ExportFailed {
            image: image.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn import_failed(image: &str, reason: impl ToString) -> Self {
        Self::ImportFailed {
            image: image.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Warnings are logged by the caller and never fail a task.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::CleanupWarning { .. })
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
