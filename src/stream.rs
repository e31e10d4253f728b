//! Streaming split API: emit outcomes as each descriptor is materialised.
//!
//! [`crate::process::process_document`] returns only after every artifact is
//! written. [`split_stream`] instead yields one `SplitOutcome` per descriptor
//! as soon as it is done, so callers can report progress or forward
//! artifacts while the rest of the bundle is still being cut. Outcomes arrive
//! in input order; each descriptor runs on the blocking pool.
//!
//! The stream ends early after the first fatal error (an artifact that could
//! not be written); that error is its last item.

use crate::error::DocSplitError;
use crate::output::DocumentDescriptor;
use crate::pipeline::split::{RangeSplitter, SplitOutcome};
use futures::stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-descriptor outcomes.
pub type SplitStream = Pin<Box<dyn Stream<Item = Result<SplitOutcome, DocSplitError>> + Send>>;

/// Split an already-loaded source, one descriptor at a time.
///
/// # Example
/// ```rust,no_run
/// use docsplit::pipeline::split::{RangeSplitter, SplitOutcome};
/// use docsplit::{split_stream, DocumentDescriptor};
/// use futures::StreamExt;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("bundle.pdf")?;
/// let splitter = RangeSplitter::load(Path::new("bundle.pdf"), &bytes, Path::new("out"), "/download")?;
/// let descriptors = vec![DocumentDescriptor::new("w2", 1, 2)];
/// let mut outcomes = split_stream(Arc::new(splitter), descriptors);
/// while let Some(outcome) = outcomes.next().await {
///     match outcome? {
///         SplitOutcome::Written(a) => println!("wrote {}", a.filename),
///         SplitOutcome::Rejected(r) => eprintln!("skipped #{}: {}", r.ordinal, r.reason),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn split_stream(
    splitter: Arc<RangeSplitter>,
    descriptors: Vec<DocumentDescriptor>,
) -> SplitStream {
    let descriptors = descriptors.into_iter().enumerate();
    let s = stream::unfold((descriptors, false), move |(mut pending, failed)| {
        let splitter = Arc::clone(&splitter);
        async move {
            if failed {
                return None;
            }
            let (idx, descriptor) = pending.next()?;
            let item = tokio::task::spawn_blocking(move || splitter.split_one(idx + 1, &descriptor))
                .await
                .map_err(|e| DocSplitError::Internal(format!("split task failed: {e}")))
                .and_then(|outcome| outcome);
            let failed = item.is_err();
            Some((item, (pending, failed)))
        }
    });

    Box::pin(s)
}

/// Load `bytes` on the blocking pool, then stream its split.
///
/// # Errors
/// Fails before streaming when the source is corrupt or empty, or the output
/// directory cannot be created.
pub async fn split_stream_from_bytes(
    bytes: Vec<u8>,
    output_dir: impl Into<PathBuf>,
    url_prefix: impl Into<String>,
    descriptors: Vec<DocumentDescriptor>,
) -> Result<SplitStream, DocSplitError> {
    let output_dir = output_dir.into();
    let url_prefix = url_prefix.into();
    let splitter = tokio::task::spawn_blocking(move || {
        RangeSplitter::load(
            std::path::Path::new("<memory>"),
            &bytes,
            &output_dir,
            &url_prefix,
        )
    })
    .await
    .map_err(|e| DocSplitError::Internal(format!("load task failed: {e}")))??;

    info!(
        "Streaming split of {} pages into {} descriptors",
        splitter.total_pages(),
        descriptors.len()
    );
    Ok(split_stream(Arc::new(splitter), descriptors))
}
