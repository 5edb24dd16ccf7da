//! Consumer-facing upload manager.
//!
//! Owns the registry and the injected collaborators, spawns one detached
//! pipeline attempt per submission or retry, and exposes the read surface
//! (snapshots, events, aggregate progress) that UI layers poll.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::client::{Compressor, StoreClient};
use crate::pipeline;
use crate::progress::{OverallProgress, overall_progress};
use crate::registry::UploadRegistry;
use crate::types::{StagedFile, Upload, UploadEvent};

/// Event channel capacity; a consumer further behind than this loses
/// intermediate change notifications.
const EVENT_CAPACITY: usize = 256;

/// Orchestrates concurrent uploads against one store.
pub struct UploadManager {
    registry: Arc<UploadRegistry>,
    compressor: Arc<dyn Compressor>,
    store: Arc<dyn StoreClient>,
    events_rx: Mutex<Option<mpsc::Receiver<UploadEvent>>>,
}

impl UploadManager {
    /// Creates a manager with the given collaborators.
    pub fn new(compressor: Arc<dyn Compressor>, store: Arc<dyn StoreClient>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            registry: Arc::new(UploadRegistry::new(events_tx)),
            compressor,
            store,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Registers `files` and starts one attempt per file.
    ///
    /// Returns the generated ids in submission order. Attempts run as
    /// detached tasks; submission never waits on them.
    pub fn submit(&self, files: Vec<StagedFile>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self.registry.insert(Upload::new(file));
            debug!(%id, "upload submitted");
            self.spawn_attempt(id);
            ids.push(id);
        }
        ids
    }

    /// Returns a snapshot of one upload.
    pub fn get(&self, id: &Uuid) -> Option<Upload> {
        self.registry.get(id)
    }

    /// Returns snapshots of all tracked uploads.
    pub fn uploads(&self) -> Vec<Upload> {
        self.registry.snapshot()
    }

    /// Requests early termination of the in-flight attempt, if any.
    ///
    /// Only signals the token: the status flips to `Cancelled` when the
    /// transfer observes the signal and reports it back. Terminal uploads
    /// and unknown ids are no-ops.
    pub fn cancel(&self, id: &Uuid) {
        if let Some(upload) = self.registry.get(id)
            && let Some(token) = upload.cancel
        {
            debug!(%id, "cancellation requested");
            token.cancel();
        }
    }

    /// Starts a brand-new attempt regardless of current status.
    ///
    /// Overlapping retries on the same id are not serialized: the later
    /// attempt's token supersedes the earlier handle, both attempts run,
    /// and the last write to the entity wins.
    pub fn retry(&self, id: &Uuid) {
        debug!(%id, "retry requested");
        self.spawn_attempt(*id);
    }

    /// Computes the aggregate projection over all uploads.
    pub fn overall_progress(&self) -> OverallProgress {
        overall_progress(&self.registry.snapshot())
    }

    fn spawn_attempt(&self, id: Uuid) {
        let registry = Arc::clone(&self.registry);
        let compressor = Arc::clone(&self.compressor);
        let store = Arc::clone(&self.store);
        tokio::spawn(pipeline::run_attempt(registry, compressor, store, id));
    }
}
