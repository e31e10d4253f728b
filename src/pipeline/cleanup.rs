//! Best-effort removal of transient uploads and split artifacts.
//!
//! Nothing in here returns an error. Every failure is logged at WARN and
//! counted in the [`CleanupReport`]; the caller's response never depends on
//! whether cleanup worked. Neither operation is transactional.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// What a cleanup pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Entries actually removed.
    pub removed: usize,
    /// Entries that could not be removed.
    pub failed: usize,
}

/// Remove each named file. Missing files are skipped silently.
pub fn cleanup_files<I, P>(paths: I) -> CleanupReport
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut report = CleanupReport::default();
    for path in paths {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                report.removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to clean up file {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }
    report
}

/// Remove one request's batch directory and everything in it.
///
/// Used when a split aborts after some artifacts were written: the batch id
/// never reaches the caller, so nothing could download them.
pub fn discard_batch(dir: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!("Discarded batch {}", dir.display());
            report.removed += 1;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!("Failed to discard batch {}: {}", dir.display(), e);
            report.failed += 1;
        }
    }
    report
}

/// Remove every entry inside the artifact directory.
///
/// Files are removed directly; batch subdirectories are removed recursively.
/// The directory itself is kept. A missing directory is a no-op, so calling
/// this twice in a row is safe.
pub fn cleanup_split_documents(dir: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return report,
        Err(e) => {
            warn!("Failed to list split documents in {}: {}", dir.display(), e);
            report.failed += 1;
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", dir.display(), e);
                report.failed += 1;
                continue;
            }
        };
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => std::fs::remove_dir_all(&path),
            _ => std::fs::remove_file(&path),
        };
        match result {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to clean up {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    debug!(
        "Cleaned {}: {} removed, {} failed",
        dir.display(),
        report.removed,
        report.failed
    );
    report
}
