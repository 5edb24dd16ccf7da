//! Per-upload attempt: compress → transmit → finalize.
//!
//! One attempt is one detached task. Every outcome (success, failure,
//! cancellation) is written back through the registry; nothing is raised
//! to the caller. The attempt never holds an entity reference across an
//! await: each write is a re-fetch-then-merge through
//! [`UploadRegistry::update`], so interleaved attempts cannot lose
//! updates.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{CompressionConstraints, Compressor, StoreClient};
use crate::error::TransferError;
use crate::registry::UploadRegistry;
use crate::types::{UploadEvent, UploadPatch, UploadStatus};

/// Fixed constraints applied to every compression pass.
pub const COMPRESSION_CONSTRAINTS: CompressionConstraints = CompressionConstraints {
    max_width: 1000,
    max_height: 1000,
    quality: 0.8,
};

/// Runs one attempt for the upload identified by `id`.
pub(crate) async fn run_attempt(
    registry: Arc<UploadRegistry>,
    compressor: Arc<dyn Compressor>,
    store: Arc<dyn StoreClient>,
    id: Uuid,
) {
    // Absent entity: never created, or dropped by a consumer. Nothing to do.
    let Some(upload) = registry.get(&id) else {
        return;
    };
    let source = Arc::clone(&upload.source);

    // Fresh token per attempt; the begin patch supersedes any previous
    // handle and clears derived fields so stale progress from an earlier
    // attempt never shows through.
    let cancel = CancellationToken::new();
    registry.update(&id, UploadPatch::begin_attempt(cancel.clone()));

    debug!(%id, name = %upload.name, "attempt started");

    let compressed = match compressor.compress(source, COMPRESSION_CONSTRAINTS).await {
        Ok(file) => file,
        Err(e) => {
            warn!(%id, error = %e, "compression failed");
            finish(&registry, id, UploadPatch::failed(), UploadStatus::Failed);
            return;
        }
    };

    registry.update(&id, UploadPatch::compressed(compressed.size_bytes()));

    // Cancellation requested while compressing is not handled here: the
    // transfer checks the token before any I/O and reports Cancelled.
    let on_progress = {
        let registry = Arc::clone(&registry);
        Box::new(move |sent: u64| {
            registry.update(&id, UploadPatch::uploaded(sent));
        })
    };

    match store.upload(compressed, on_progress, cancel).await {
        Ok(url) => {
            debug!(%id, url = %url, "attempt completed");
            finish(
                &registry,
                id,
                UploadPatch::completed(url),
                UploadStatus::Completed,
            );
        }
        Err(TransferError::Cancelled) => {
            debug!(%id, "attempt cancelled");
            finish(
                &registry,
                id,
                UploadPatch::cancelled(),
                UploadStatus::Cancelled,
            );
        }
        Err(e) => {
            warn!(%id, error = %e, "transfer failed");
            finish(&registry, id, UploadPatch::failed(), UploadStatus::Failed);
        }
    }
}

fn finish(registry: &UploadRegistry, id: Uuid, patch: UploadPatch, status: UploadStatus) {
    registry.update(&id, patch);
    registry.notify(UploadEvent::Finished { id, status });
}
