mod encode;
mod error;
mod ladder;
mod manifest;
mod plan;
mod probe;
mod staging;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{CadenzaConfig, TranscodeSection};
use crate::store::{upload_tree, ObjectFetcher, ObjectSink, S3Store};

pub use encode::{ChunkEncoder, FfmpegEncoder};
pub use error::{PipelineError, PipelineResult};
pub use ladder::run_ladder;
pub use manifest::{write_master, MASTER_PLAYLIST_NAME};
pub use plan::plan_chunks;
pub use probe::{FfprobeProber, MediaProber};
pub use staging::StagingArea;
pub use types::{song_key_for, Chunk, Job, JobReport};

/// One-job transcoding pipeline: fetch, probe, plan, encode the ladder,
/// write the master playlist, upload the tree.
///
/// Strictly sequential at the top level; the only parallelism lives in the
/// ladder executor. Any step's error aborts the job and the staging
/// directory is released on every exit path.
pub struct Pipeline {
    fetcher: Arc<dyn ObjectFetcher>,
    sink: Arc<dyn ObjectSink>,
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn ChunkEncoder>,
    settings: TranscodeSection,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        sink: Arc<dyn ObjectSink>,
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn ChunkEncoder>,
        settings: TranscodeSection,
    ) -> Self {
        Self {
            fetcher,
            sink,
            prober,
            encoder,
            settings,
        }
    }

    /// Wires the pipeline against the real collaborators: two S3 stores and
    /// the external ffmpeg/ffprobe binaries named in the config.
    pub fn from_config(config: &CadenzaConfig) -> Self {
        let fetcher = Arc::new(S3Store::new(&config.source_bucket));
        let sink = Arc::new(S3Store::new(&config.destination_bucket));
        let prober = Arc::new(FfprobeProber::new(&config.transcode.prober_binary));
        let encoder = Arc::new(FfmpegEncoder::new(&config.transcode.encoder_binary));
        Self::new(fetcher, sink, prober, encoder, config.transcode.clone())
    }

    pub async fn run(&self, job: &Job, cancel: &CancellationToken) -> PipelineResult<JobReport> {
        if self.settings.ladder_bitrates.is_empty() {
            return Err(PipelineError::InvalidEvent(
                "configured bitrate ladder is empty".into(),
            ));
        }

        // The job timeout shares the cancellation path: a child token fires
        // either when the caller cancels or when the clock runs out.
        let token = cancel.child_token();
        let timeout_guard = self.settings.job_timeout().map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(?timeout, "job timeout reached, cancelling");
                token.cancel();
            })
        });

        let mut staging =
            StagingArea::acquire(&self.settings.staging_root, &job.song_key).await?;
        let result = self.execute(job, &staging, &token).await;
        staging.release().await;
        if let Some(guard) = timeout_guard {
            guard.abort();
        }

        match &result {
            Ok(report) => info!(
                song_key = %report.song_key,
                chunks = report.chunks,
                files = report.files_uploaded,
                "job completed"
            ),
            Err(err) => warn!(song_key = %job.song_key, error = %err, "job failed"),
        }
        result
    }

    async fn execute(
        &self,
        job: &Job,
        staging: &StagingArea,
        cancel: &CancellationToken,
    ) -> PipelineResult<JobReport> {
        info!(
            song_key = %job.song_key,
            source = %job.source_object,
            "transcoding song"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.fetcher.fetch(&job.source_bucket, &job.source_object, staging.source()) => result?,
        }

        let duration = self.prober.duration(staging.source(), cancel).await?;
        let chunks = plan_chunks(duration, self.settings.chunk_size_seconds)?;
        info!(
            song_key = %job.song_key,
            duration,
            chunks = chunks.len(),
            "planned chunks"
        );

        run_ladder(
            staging.source(),
            &chunks,
            &self.settings.ladder_bitrates,
            Arc::clone(&self.encoder),
            staging,
            self.settings.max_concurrency,
            cancel,
        )
        .await?;

        write_master(
            staging.tree_root(),
            &self.settings.ladder_bitrates,
            chunks.len(),
        )
        .await?;

        let files_uploaded = upload_tree(
            self.sink.as_ref(),
            staging.tree_root(),
            &job.destination_bucket,
            &job.song_key,
            cancel,
        )
        .await?;

        Ok(JobReport {
            song_key: job.song_key.clone(),
            duration_seconds: duration,
            chunks: chunks.len(),
            ladder: self.settings.ladder_bitrates.clone(),
            files_uploaded,
        })
    }
}
