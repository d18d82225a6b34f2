//! Where runtime archives come from.

use crate::packager::Result;
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Byte stream of a runtime archive.
pub type ArchiveStream = Pin<Box<dyn AsyncRead + Send>>;

/// Capability to open a remote runtime archive as a stream.
///
/// Implemented over HTTP by
/// [`HttpArchiveSource`](crate::packager::utils::http::HttpArchiveSource);
/// tests serve archives from memory.
pub trait ArchiveSource: Send + Sync {
    /// Opens the archive at `url`.
    ///
    /// A non-success response is [`Error::Fetch`](crate::packager::Error::Fetch),
    /// an empty one [`Error::MissingBody`](crate::packager::Error::MissingBody).
    fn open(&self, url: &str) -> impl Future<Output = Result<ArchiveStream>> + Send;
}
