//! Entity model for tracked uploads.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// An in-memory file payload staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Display name, usually the source file name.
    pub name: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

impl StagedFile {
    /// Creates a staged file from a name and its payload.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Payload size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Lifecycle status of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// An attempt is running (or was just scheduled).
    InProgress,
    /// The store accepted the file; `remote_url` is set.
    Completed,
    /// Compression or transfer failed.
    Failed,
    /// The in-flight transfer observed a cancellation signal.
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` once no further attempt activity is expected
    /// (short of an explicit retry).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::InProgress)
    }
}

/// One user-submitted file's tracked lifecycle record.
///
/// Reads from the registry return clones of this struct; the source payload
/// is shared behind an `Arc` so snapshots and retries stay cheap.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Registry key, generated at creation.
    pub id: Uuid,
    /// Display name, from the source file.
    pub name: String,
    /// Original payload; immutable across attempts.
    pub source: Arc<StagedFile>,
    pub status: UploadStatus,
    /// Size of the source payload, fixed at creation.
    pub original_size_bytes: u64,
    /// Set once compression completes for the current attempt; cleared when
    /// a new attempt starts.
    pub compressed_size_bytes: Option<u64>,
    /// Bytes confirmed transmitted for the current attempt.
    pub uploaded_size_bytes: u64,
    /// Set only on successful completion.
    pub remote_url: Option<String>,
    /// Token for the attempt currently in flight; `None` between attempts.
    pub cancel: Option<CancellationToken>,
}

impl Upload {
    /// Constructs a fresh record for `source`, already marked in-progress.
    pub fn new(source: StagedFile) -> Self {
        let original_size_bytes = source.size_bytes();
        Self {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            source: Arc::new(source),
            status: UploadStatus::InProgress,
            original_size_bytes,
            compressed_size_bytes: None,
            uploaded_size_bytes: 0,
            remote_url: None,
            cancel: None,
        }
    }
}

/// Partial update merged into an [`Upload`] under the registry's write lock.
///
/// The outer `Option` on each field means "leave untouched"; for clearable
/// fields the inner `Option` is the new value, with `None` clearing it.
/// The named constructors cover the pipeline's whole write set.
#[derive(Debug, Clone, Default)]
pub struct UploadPatch {
    pub status: Option<UploadStatus>,
    pub compressed_size_bytes: Option<Option<u64>>,
    pub uploaded_size_bytes: Option<u64>,
    pub remote_url: Option<Option<String>>,
    pub cancel: Option<Option<CancellationToken>>,
}

impl UploadPatch {
    /// Resets the entity for a fresh attempt and attaches its token.
    ///
    /// Clears every derived field so stale progress from a prior attempt
    /// never leaks into the new attempt's view.
    pub fn begin_attempt(token: CancellationToken) -> Self {
        Self {
            status: Some(UploadStatus::InProgress),
            compressed_size_bytes: Some(None),
            uploaded_size_bytes: Some(0),
            remote_url: Some(None),
            cancel: Some(Some(token)),
        }
    }

    /// Records the compressed payload size for the current attempt.
    pub fn compressed(size_bytes: u64) -> Self {
        Self {
            compressed_size_bytes: Some(Some(size_bytes)),
            ..Self::default()
        }
    }

    /// Records cumulative bytes transmitted for the current attempt.
    pub fn uploaded(size_bytes: u64) -> Self {
        Self {
            uploaded_size_bytes: Some(size_bytes),
            ..Self::default()
        }
    }

    /// Marks the attempt successful and detaches its token.
    pub fn completed(url: String) -> Self {
        Self {
            status: Some(UploadStatus::Completed),
            remote_url: Some(Some(url)),
            cancel: Some(None),
            ..Self::default()
        }
    }

    /// Marks the attempt failed and detaches its token.
    pub fn failed() -> Self {
        Self {
            status: Some(UploadStatus::Failed),
            cancel: Some(None),
            ..Self::default()
        }
    }

    /// Marks the attempt cancelled and detaches its token.
    ///
    /// No other field is touched: `uploaded_size_bytes` keeps its last
    /// reported value.
    pub fn cancelled() -> Self {
        Self {
            status: Some(UploadStatus::Cancelled),
            cancel: Some(None),
            ..Self::default()
        }
    }

    /// Merges the patch into `upload`, field by field.
    pub(crate) fn apply(self, upload: &mut Upload) {
        if let Some(status) = self.status {
            upload.status = status;
        }
        if let Some(v) = self.compressed_size_bytes {
            upload.compressed_size_bytes = v;
        }
        if let Some(v) = self.uploaded_size_bytes {
            upload.uploaded_size_bytes = v;
        }
        if let Some(v) = self.remote_url {
            upload.remote_url = v;
        }
        if let Some(v) = self.cancel {
            upload.cancel = v;
        }
    }
}

/// Change notification emitted by the registry and pipeline.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Any tracked field of the upload changed.
    Updated { id: Uuid },
    /// An attempt reached a terminal status.
    Finished { id: Uuid, status: UploadStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(size: usize) -> StagedFile {
        StagedFile::new("photo.jpg", vec![0u8; size])
    }

    #[test]
    fn new_upload_starts_in_progress() {
        let upload = Upload::new(sample_file(128));
        assert_eq!(upload.status, UploadStatus::InProgress);
        assert_eq!(upload.name, "photo.jpg");
        assert_eq!(upload.original_size_bytes, 128);
        assert_eq!(upload.uploaded_size_bytes, 0);
        assert!(upload.compressed_size_bytes.is_none());
        assert!(upload.remote_url.is_none());
        assert!(upload.cancel.is_none());
    }

    #[test]
    fn upload_ids_are_unique() {
        let a = Upload::new(sample_file(1));
        let b = Upload::new(sample_file(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn status_terminality() {
        assert!(!UploadStatus::InProgress.is_terminal());
        assert!(UploadStatus::Completed.is_terminal());
        assert!(UploadStatus::Failed.is_terminal());
        assert!(UploadStatus::Cancelled.is_terminal());
    }

    #[test]
    fn default_patch_is_a_no_op() {
        let mut upload = Upload::new(sample_file(64));
        upload.compressed_size_bytes = Some(32);
        upload.uploaded_size_bytes = 16;
        let before = upload.clone();

        UploadPatch::default().apply(&mut upload);

        assert_eq!(upload.status, before.status);
        assert_eq!(upload.compressed_size_bytes, before.compressed_size_bytes);
        assert_eq!(upload.uploaded_size_bytes, before.uploaded_size_bytes);
        assert_eq!(upload.remote_url, before.remote_url);
    }

    #[test]
    fn begin_attempt_clears_derived_fields() {
        let mut upload = Upload::new(sample_file(64));
        upload.status = UploadStatus::Failed;
        upload.compressed_size_bytes = Some(32);
        upload.uploaded_size_bytes = 20;
        upload.remote_url = Some("https://store/old".into());

        let token = CancellationToken::new();
        UploadPatch::begin_attempt(token.clone()).apply(&mut upload);

        assert_eq!(upload.status, UploadStatus::InProgress);
        assert!(upload.compressed_size_bytes.is_none());
        assert_eq!(upload.uploaded_size_bytes, 0);
        assert!(upload.remote_url.is_none());
        assert!(upload.cancel.is_some());
    }

    #[test]
    fn begin_attempt_supersedes_previous_token() {
        let mut upload = Upload::new(sample_file(64));
        let first = CancellationToken::new();
        UploadPatch::begin_attempt(first.clone()).apply(&mut upload);

        let second = CancellationToken::new();
        UploadPatch::begin_attempt(second.clone()).apply(&mut upload);

        // Signalling the replaced handle must not reach the new attempt.
        first.cancel();
        assert!(!upload.cancel.as_ref().unwrap().is_cancelled());
    }

    #[test]
    fn completed_patch_sets_url_and_detaches_token() {
        let mut upload = Upload::new(sample_file(64));
        UploadPatch::begin_attempt(CancellationToken::new()).apply(&mut upload);
        UploadPatch::compressed(32).apply(&mut upload);
        UploadPatch::uploaded(32).apply(&mut upload);
        UploadPatch::completed("https://store/abc".into()).apply(&mut upload);

        assert_eq!(upload.status, UploadStatus::Completed);
        assert_eq!(upload.remote_url.as_deref(), Some("https://store/abc"));
        assert!(upload.cancel.is_none());
        // Derived sizes survive the terminal transition.
        assert_eq!(upload.compressed_size_bytes, Some(32));
        assert_eq!(upload.uploaded_size_bytes, 32);
    }

    #[test]
    fn cancelled_patch_keeps_last_progress() {
        let mut upload = Upload::new(sample_file(64));
        UploadPatch::begin_attempt(CancellationToken::new()).apply(&mut upload);
        UploadPatch::compressed(40).apply(&mut upload);
        UploadPatch::uploaded(17).apply(&mut upload);
        UploadPatch::cancelled().apply(&mut upload);

        assert_eq!(upload.status, UploadStatus::Cancelled);
        assert_eq!(upload.uploaded_size_bytes, 17);
        assert!(upload.remote_url.is_none());
        assert!(upload.cancel.is_none());
    }
}
