//! Derived aggregate progress across all tracked uploads.

use crate::types::{Upload, UploadStatus};

/// Global progress indicator derived from the full registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverallProgress {
    /// `true` while at least one upload is in flight.
    pub any_in_progress: bool,
    /// Completion percentage in `0..=100`.
    pub percentage: u8,
}

/// Computes the aggregate projection over a set of upload snapshots.
///
/// With nothing in flight the report is always 100, independent of how the
/// individual uploads ended. While work is outstanding, every upload weighs
/// into the denominator (its compressed size once known, its original size
/// until then), but only uploads past compression contribute sent bytes to
/// the numerator.
pub fn overall_progress(uploads: &[Upload]) -> OverallProgress {
    let any_in_progress = uploads
        .iter()
        .any(|u| u.status == UploadStatus::InProgress);
    if !any_in_progress {
        return OverallProgress {
            any_in_progress: false,
            percentage: 100,
        };
    }

    let mut numerator: u64 = 0;
    let mut denominator: u64 = 0;
    for upload in uploads {
        match upload.compressed_size_bytes {
            Some(compressed) => {
                denominator += compressed;
                numerator += upload.uploaded_size_bytes;
            }
            None => denominator += upload.original_size_bytes,
        }
    }

    // All-empty payloads: no bytes outstanding.
    if denominator == 0 {
        return OverallProgress {
            any_in_progress: true,
            percentage: 100,
        };
    }

    let percentage = (100.0 * numerator as f64 / denominator as f64).round() as u64;
    OverallProgress {
        any_in_progress: true,
        percentage: percentage.min(100) as u8,
    }
}
