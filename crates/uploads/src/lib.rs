//! Upload orchestration core: entity model, registry, per-upload pipeline
//! state machine, and the derived aggregate-progress projection.
//!
//! The transfer and compression collaborators are consumed through the
//! [`StoreClient`] and [`Compressor`] traits, keeping the pipeline decoupled
//! from HTTP and codec details and testable with mocks.
//!
//! # Lifecycle
//!
//! 1. **Submit** — [`UploadManager::submit`] registers one [`Upload`] per
//!    staged file and spawns a detached attempt for each.
//! 2. **Attempt** — compress, then transmit with byte-level progress, then
//!    finalize; every outcome is written back through the registry.
//! 3. **Observe** — consumers read snapshots, drain [`UploadEvent`]s, and
//!    recompute [`overall_progress`] on every change.
//! 4. **Control** — [`UploadManager::cancel`] signals the in-flight attempt;
//!    [`UploadManager::retry`] starts a brand-new attempt with cleared
//!    derived state.

pub mod client;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod types;

// Re-export primary types for convenience.
pub use client::{CompressionConstraints, Compressor, ProgressFn, StoreClient};
pub use error::{CompressError, TransferError};
pub use manager::UploadManager;
pub use pipeline::COMPRESSION_CONSTRAINTS;
pub use progress::{OverallProgress, overall_progress};
pub use registry::UploadRegistry;
pub use types::{StagedFile, Upload, UploadEvent, UploadPatch, UploadStatus};
