use std::path::PathBuf;

use thiserror::Error;

/// How many characters of subprocess stderr an error message may carry.
const STDERR_TAIL_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("failed to fetch {bucket}/{key}: {reason}")]
    FetchFailed {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("probe binary not found: {0}")]
    ProbeUnavailable(String),
    #[error("probe exited with {status:?}: {stderr}")]
    ProbeFailed {
        status: Option<i32>,
        stderr: String,
    },
    #[error("could not parse media duration from probe output: {0:?}")]
    DurationUnparseable(String),
    #[error("encoder binary not found: {0}")]
    EncoderUnavailable(String),
    #[error("encoder failed for bitrate {bitrate} chunk {chunk} with {status:?}: {stderr}")]
    EncoderFailed {
        bitrate: u32,
        chunk: u32,
        status: Option<i32>,
        stderr: String,
    },
    #[error("encoder exited cleanly but {path} is missing")]
    EncoderOutputMissing { path: PathBuf },
    #[error("failed to write master playlist: {0}")]
    ManifestWriteFailed(String),
    #[error("failed to upload {key}: {reason}")]
    UploadFailed { key: String, reason: String },
    #[error("job cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Internal(error.to_string())
        }
    }
}

/// Keeps the last characters of a subprocess stderr so error messages stay
/// bounded without splitting a multi-byte sequence.
pub(crate) fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .take(STDERR_TAIL_CHARS)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}

pub type PipelineResult<T> = Result<T, PipelineError>;
