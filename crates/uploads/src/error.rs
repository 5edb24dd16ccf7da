//! Error taxonomy for the upload pipeline.
//!
//! Both error kinds are caught at the attempt boundary and collapse into
//! the upload's status; nothing here is surfaced to callers directly.

/// Errors produced while compressing a staged file.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("task join error: {0}")]
    Join(String),
}

/// Errors produced while transmitting a file to the store.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The cancellation token fired before the transfer completed.
    /// Distinguished from the failure variants: it maps to
    /// [`UploadStatus::Cancelled`](crate::UploadStatus::Cancelled), not
    /// [`UploadStatus::Failed`](crate::UploadStatus::Failed).
    #[error("cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("store returned status {0}")]
    Status(u16),

    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}
