//! # Progress
//!
//! Byte counting for archive streams, kept apart from how progress is drawn.
//!
//! [`ProgressReader`] sits between a transport and an [`ArchiveStream`] and
//! counts what passes through. Rendering belongs to whatever
//! [`ProgressReporter`] the caller plugs in; the core only ships
//! [`NoProgress`].
//!
//! [`ArchiveStream`]: crate::runtime::ArchiveStream

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Creates one progress handle per transfer.
pub trait ProgressReporter: Send + Sync {
    /// `total` is `None` when the size is unknown.
    fn begin(&self, label: &str, total: Option<u64>) -> Arc<dyn ProgressHandle>;
}

/// A single transfer's progress.
pub trait ProgressHandle: Send + Sync {
    fn set_position(&self, position: u64);
    fn finish(&self);
}

/// Reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn begin(&self, _label: &str, _total: Option<u64>) -> Arc<dyn ProgressHandle> {
        Arc::new(NoProgress)
    }
}

impl ProgressHandle for NoProgress {
    fn set_position(&self, _position: u64) {}
    fn finish(&self) {}
}

/// Running byte count clamped to a known total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCounter {
    position: u64,
    total: u64,
}

impl ProgressCounter {
    /// A `total` of 0 means unknown.
    pub fn new(total: u64) -> Self {
        Self { position: 0, total }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn total(&self) -> Option<u64> {
        (self.total > 0).then_some(self.total)
    }

    /// Accounts for `n` freshly read bytes.
    ///
    /// Returns the new position when it moved. With a known total the
    /// position never passes it, so the total is reported at most once.
    pub fn record(&mut self, n: u64) -> Option<u64> {
        let next: u64 = match self.total {
            0 => self.position.saturating_add(n),
            total => self.position.saturating_add(n).min(total),
        };

        if next == self.position {
            return None;
        }
        self.position = next;
        Some(next)
    }
}

/// Read-through wrapper reporting every advance of its counter.
///
/// Bytes and errors from the inner reader pass through untouched.
pub struct ProgressReader<R> {
    inner: R,
    counter: ProgressCounter,
    handle: Arc<dyn ProgressHandle>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, handle: Arc<dyn ProgressHandle>) -> Self {
        Self {
            inner,
            counter: ProgressCounter::new(total),
            handle,
        }
    }

    pub fn counter(&self) -> ProgressCounter {
        self.counter
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before: usize = buf.filled().len();

        let polled = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &polled {
            let read: u64 = (buf.filled().len() - before) as u64;
            if let Some(position) = this.counter.record(read) {
                this.handle.set_position(position);
            }
        }
        polled
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
