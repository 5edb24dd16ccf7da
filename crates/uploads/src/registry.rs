//! Owning store mapping upload ids to their lifecycle records.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use crate::types::{Upload, UploadEvent, UploadPatch};

/// Keyed store of uploads; the only shared mutable resource in the core.
///
/// All mutation goes through [`insert`](Self::insert) and
/// [`update`](Self::update), each a single critical section under the write
/// lock. Reads return snapshots, so no caller ever holds a live entity
/// reference across an await point.
pub struct UploadRegistry {
    inner: RwLock<HashMap<Uuid, Upload>>,
    events_tx: mpsc::Sender<UploadEvent>,
}

impl UploadRegistry {
    /// Creates an empty registry emitting change events on `events_tx`.
    pub fn new(events_tx: mpsc::Sender<UploadEvent>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            events_tx,
        }
    }

    /// Inserts a new upload under its id and returns the id.
    pub fn insert(&self, upload: Upload) -> Uuid {
        let id = upload.id;
        self.inner.write().unwrap().insert(id, upload);
        self.notify(UploadEvent::Updated { id });
        id
    }

    /// Returns a snapshot of one upload, if present.
    pub fn get(&self, id: &Uuid) -> Option<Upload> {
        self.inner.read().unwrap().get(id).cloned()
    }

    /// Returns snapshots of all tracked uploads.
    pub fn snapshot(&self) -> Vec<Upload> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Number of tracked uploads.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges `patch` into the upload under the write lock.
    ///
    /// Unknown ids are a silent no-op: the entity may have been dropped by
    /// a concurrent consumer, and the pipeline treats that as "nothing to
    /// do" rather than an error.
    pub fn update(&self, id: &Uuid, patch: UploadPatch) {
        {
            let mut inner = self.inner.write().unwrap();
            let Some(upload) = inner.get_mut(id) else {
                return;
            };
            patch.apply(upload);
        }
        self.notify(UploadEvent::Updated { id: *id });
    }

    /// Emits an event without blocking.
    ///
    /// A consumer further behind than the channel capacity loses
    /// intermediate notifications; entity state stays readable via
    /// snapshots either way.
    pub(crate) fn notify(&self, event: UploadEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events_tx.try_send(event) {
            trace!("upload event dropped: consumer lagging");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StagedFile, UploadStatus};
    use tokio_util::sync::CancellationToken;

    fn registry() -> (UploadRegistry, mpsc::Receiver<UploadEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (UploadRegistry::new(tx), rx)
    }

    fn staged(size: usize) -> StagedFile {
        StagedFile::new("file.png", vec![7u8; size])
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let (reg, _rx) = registry();
        let id = reg.insert(Upload::new(staged(10)));

        let upload = reg.get(&id).unwrap();
        assert_eq!(upload.id, id);
        assert_eq!(upload.original_size_bytes, 10);
        assert_eq!(reg.len(), 1);
        assert!(!reg.is_empty());
    }

    #[test]
    fn get_unknown_id_is_none() {
        let (reg, _rx) = registry();
        assert!(reg.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn update_merges_fields() {
        let (reg, _rx) = registry();
        let id = reg.insert(Upload::new(staged(100)));

        reg.update(&id, UploadPatch::compressed(60));
        reg.update(&id, UploadPatch::uploaded(30));

        let upload = reg.get(&id).unwrap();
        assert_eq!(upload.compressed_size_bytes, Some(60));
        assert_eq!(upload.uploaded_size_bytes, 30);
        // Untouched fields survive.
        assert_eq!(upload.status, UploadStatus::InProgress);
        assert_eq!(upload.original_size_bytes, 100);
    }

    #[test]
    fn update_unknown_id_is_silent() {
        let (reg, _rx) = registry();
        reg.insert(Upload::new(staged(10)));
        // Must not panic and must not touch existing entries.
        reg.update(&Uuid::new_v4(), UploadPatch::failed());
        assert_eq!(reg.len(), 1);
        assert!(
            reg.snapshot()
                .iter()
                .all(|u| u.status == UploadStatus::InProgress)
        );
    }

    #[test]
    fn snapshot_returns_all_entries() {
        let (reg, _rx) = registry();
        let a = reg.insert(Upload::new(staged(1)));
        let b = reg.insert(Upload::new(staged(2)));

        let ids: Vec<Uuid> = reg.snapshot().iter().map(|u| u.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
    }

    #[test]
    fn snapshots_are_detached_from_the_store() {
        let (reg, _rx) = registry();
        let id = reg.insert(Upload::new(staged(10)));

        let mut snapshot = reg.get(&id).unwrap();
        snapshot.uploaded_size_bytes = 999;

        assert_eq!(reg.get(&id).unwrap().uploaded_size_bytes, 0);
    }

    #[test]
    fn mutations_emit_events() {
        let (reg, mut rx) = registry();
        let id = reg.insert(Upload::new(staged(10)));
        reg.update(&id, UploadPatch::begin_attempt(CancellationToken::new()));

        let mut updated = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                UploadEvent::Updated { id: event_id } => {
                    assert_eq!(event_id, id);
                    updated += 1;
                }
                UploadEvent::Finished { .. } => panic!("no terminal event expected"),
            }
        }
        assert_eq!(updated, 2);
    }

    #[test]
    fn full_channel_does_not_block_mutation() {
        let (tx, _rx) = mpsc::channel(1);
        let reg = UploadRegistry::new(tx);
        let id = reg.insert(Upload::new(staged(10)));
        // Capacity exhausted by the insert event; further updates must
        // still apply.
        reg.update(&id, UploadPatch::uploaded(5));
        reg.update(&id, UploadPatch::uploaded(9));
        assert_eq!(reg.get(&id).unwrap().uploaded_size_bytes, 9);
    }

    #[test]
    fn concurrent_updates_to_different_entries() {
        use std::sync::Arc;
        use std::thread;

        let (tx, _rx) = mpsc::channel(1024);
        let reg = Arc::new(UploadRegistry::new(tx));

        let ids: Vec<Uuid> = (0..8)
            .map(|_| reg.insert(Upload::new(staged(1000))))
            .collect();

        let mut handles = vec![];
        for id in ids.clone() {
            let reg = Arc::clone(&reg);
            handles.push(thread::spawn(move || {
                for sent in 1..=100u64 {
                    reg.update(&id, UploadPatch::uploaded(sent));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        for id in ids {
            assert_eq!(reg.get(&id).unwrap().uploaded_size_bytes, 100);
        }
    }
}
