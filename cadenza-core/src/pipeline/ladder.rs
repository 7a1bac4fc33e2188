use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::encode::ChunkEncoder;
use super::error::{PipelineError, PipelineResult};
use super::staging::StagingArea;
use super::types::Chunk;

/// Encodes the full Cartesian product (bitrate x chunk) in parallel.
///
/// Every pair is spawned as its own task; a semaphore bounds how many
/// encoder subprocesses run at once, defaulting to one per CPU core. The
/// executor only returns after every task has settled, reporting the first
/// error by arrival order; remaining errors are logged and discarded. On
/// cancellation, in-flight encodes are killed at the process boundary,
/// unstarted pairs are skipped, and `Cancelled` is returned.
pub async fn run_ladder(
    source: &Path,
    chunks: &[Chunk],
    bitrates: &[u32],
    encoder: Arc<dyn ChunkEncoder>,
    staging: &StagingArea,
    max_concurrency: usize,
    cancel: &CancellationToken,
) -> PipelineResult<()> {
    let permits = if max_concurrency > 0 {
        max_concurrency
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    };
    let semaphore = Arc::new(Semaphore::new(permits));
    debug!(
        tasks = bitrates.len() * chunks.len(),
        permits, "starting ladder execution"
    );

    let mut tasks: JoinSet<PipelineResult<()>> = JoinSet::new();
    for &bitrate in bitrates {
        let rendition_dir = staging.rendition_dir(bitrate).await?;
        for chunk in chunks {
            tasks.spawn(encode_task(
                source.to_path_buf(),
                chunk.clone(),
                bitrate,
                rendition_dir.clone(),
                Arc::clone(&encoder),
                Arc::clone(&semaphore),
                cancel.clone(),
            ));
        }
    }

    let mut first_error: Option<PipelineError> = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = outcome {
            if first_error.is_none() {
                first_error = Some(err);
            } else if !err.is_cancelled() {
                warn!(error = %err, "additional encode failure discarded");
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn encode_task(
    source: PathBuf,
    chunk: Chunk,
    bitrate: u32,
    rendition_dir: PathBuf,
    encoder: Arc<dyn ChunkEncoder>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> PipelineResult<()> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        permit = semaphore.acquire_owned() => {
            permit.map_err(|err| PipelineError::Internal(err.to_string()))?
        }
    };
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    debug!(bitrate, chunk = chunk.index, "encoding chunk");
    encoder
        .encode(&source, &chunk, bitrate, &rendition_dir, &cancel)
        .await
}
