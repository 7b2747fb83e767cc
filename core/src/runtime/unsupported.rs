use async_trait::async_trait;

use cmover_common::migration::RuntimeKind;
use cmover_common::{MigrationError, Result};

use super::{ArchiveStream, ImageSink};

/// A destination the tool knows by name but cannot import into yet.
///
/// Every call fails with [`MigrationError::UnsupportedDestination`].
#[derive(Debug, Clone, Copy)]
pub struct UnimplementedSink {
    from: RuntimeKind,
    to: RuntimeKind,
}

impl UnimplementedSink {
    pub fn new(from: RuntimeKind, to: RuntimeKind) -> Self {
        Self { from, to }
    }

    fn unsupported(&self) -> MigrationError {
        MigrationError::UnsupportedDestination {
            from: self.from,
            to: self.to,
        }
    }
}

#[async_trait]
impl ImageSink for UnimplementedSink {
    fn kind(&self) -> RuntimeKind {
        self.to
    }

    async fn import(&self, _archive: ArchiveStream, _reference: &str, _namespace: &str) -> Result<String> {
        Err(self.unsupported())
    }

    fn remote_import_command(&self, _archive_path: &str, _reference: &str, _namespace: &str) -> Result<String> {
        Err(self.unsupported())
    }
}
