//! Trait seams for the compression and transfer collaborators.
//!
//! The pipeline consumes these traits; concrete implementations live in
//! their own crates (`updrop-compress`, `updrop-store-client`) and tests
//! supply mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{CompressError, TransferError};
use crate::types::StagedFile;

/// Callback invoked with cumulative bytes sent.
pub type ProgressFn = Box<dyn Fn(u64) + Send + Sync>;

/// Size and quality constraints for one compression pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionConstraints {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`.
    pub quality: f32,
}

/// Transforms a staged file into an equal-or-smaller transcoded one.
pub trait Compressor: Send + Sync {
    /// Compresses `file` within `constraints`.
    ///
    /// Runs to completion or failure; compression itself is not
    /// cancellable. Cancellation requested meanwhile is honored by the
    /// subsequent transfer step short-circuiting.
    fn compress(
        &self,
        file: Arc<StagedFile>,
        constraints: CompressionConstraints,
    ) -> Pin<Box<dyn Future<Output = Result<StagedFile, CompressError>> + Send + '_>>;
}

/// Transmits one file to the remote store.
pub trait StoreClient: Send + Sync {
    /// Uploads `file` and returns the remote URL.
    ///
    /// `on_progress` is invoked zero or more times with monotonically
    /// non-decreasing cumulative byte counts, at most the file size,
    /// culminating at the file size on success.
    ///
    /// Fails with [`TransferError::Cancelled`] when `cancel` fires before
    /// completion. A token that fired before this call must short-circuit
    /// without any I/O.
    fn upload(
        &self,
        file: StagedFile,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + '_>>;
}
