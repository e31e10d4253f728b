//! Input handling: validate an upload and hold it on disk for one request.
//!
//! The source PDF is owned by the request. [`save_upload`] writes it under a
//! unique name in the upload directory and hands back an [`UploadGuard`];
//! dropping the guard removes the file, so the upload disappears on success,
//! on error, and on panic unwind alike.

use crate::error::DocSplitError;
use crate::pipeline::cleanup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted for upload (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 1] = ["pdf"];

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Whether the file name carries an allowed extension.
pub fn is_allowed_filename(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed and leading/trailing dots and underscores are
/// trimmed. An empty result becomes `upload.pdf`.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let s = RE_WHITESPACE.replace_all(base.trim(), "_");
    let s = RE_UNSAFE.replace_all(&s, "");
    let s = s.trim_matches(|c| c == '.' || c == '_');

    if s.is_empty() {
        "upload.pdf".to_string()
    } else {
        s.to_string()
    }
}

/// Verify the `%PDF` magic bytes.
pub fn check_pdf_magic(path: &Path, bytes: &[u8]) -> Result<(), DocSplitError> {
    if bytes.len() >= 4 && &bytes[..4] == b"%PDF" {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(DocSplitError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Validate an upload before anything touches the disk.
///
/// Checks, in order: a file name was given, the extension is allowed, the
/// size is within `max_bytes`, and the content starts with `%PDF`.
///
/// # Returns
/// The sanitised file name.
pub fn validate_upload(
    filename: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<String, DocSplitError> {
    if filename.trim().is_empty() {
        return Err(DocSplitError::NoFileSelected);
    }
    if !is_allowed_filename(filename) {
        return Err(DocSplitError::UnsupportedFileType {
            filename: filename.to_string(),
        });
    }
    if bytes.len() > max_bytes {
        return Err(DocSplitError::UploadTooLarge {
            size: bytes.len(),
            limit_mb: max_bytes.div_ceil(1024 * 1024),
        });
    }
    let safe = secure_filename(filename);
    check_pdf_magic(Path::new(&safe), bytes)?;
    Ok(safe)
}

/// A transient upload on disk, removed when dropped.
#[derive(Debug)]
pub struct UploadGuard {
    path: PathBuf,
}

impl UploadGuard {
    /// Take ownership of an existing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the stored upload.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        cleanup::cleanup_files([self.path.as_path()]);
    }
}

/// Store an upload as `{uuid}_{safe_name}` inside `upload_dir`.
pub async fn save_upload(
    upload_dir: &Path,
    safe_name: &str,
    bytes: &[u8],
) -> Result<UploadGuard, DocSplitError> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| DocSplitError::UploadWriteFailed {
            path: upload_dir.to_path_buf(),
            source: e,
        })?;

    let path = upload_dir.join(format!("{}_{}", uuid::Uuid::new_v4().simple(), safe_name));
    // Guard first: a partially written file is still removed.
    let guard = UploadGuard::new(&path);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| DocSplitError::UploadWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    debug!("Stored upload: {} ({} bytes)", path.display(), bytes.len());
    Ok(guard)
}

/// Read a local source file, mapping the common I/O failures.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, DocSplitError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DocSplitError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(DocSplitError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}
