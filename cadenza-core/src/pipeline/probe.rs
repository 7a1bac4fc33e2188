use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::{stderr_tail, PipelineError, PipelineResult};

/// Reads the media duration of a local file, in seconds.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn duration(&self, source: &Path, cancel: &CancellationToken) -> PipelineResult<f64>;
}

/// Invokes the external probe binary (ffprobe by default) and parses the
/// container duration from its csv output.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: String,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn duration(&self, source: &Path, cancel: &CancellationToken) -> PipelineResult<f64> {
        let mut command = Command::new(&self.binary);
        command
            .kill_on_drop(true)
            .arg("-i")
            .arg(source)
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-v")
            .arg("quiet")
            .arg("-of")
            .arg("csv=p=0");

        // Dropping the output future on cancellation kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = command.output() => result,
        };

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::ProbeUnavailable(self.binary.clone()));
            }
            Err(err) => return Err(PipelineError::Internal(err.to_string())),
        };

        if !output.status.success() {
            return Err(PipelineError::ProbeFailed {
                status: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_duration(raw: &str) -> PipelineResult<f64> {
    let trimmed = raw.trim();
    let duration: f64 = trimmed
        .parse()
        .map_err(|_| PipelineError::DurationUnparseable(trimmed.to_string()))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PipelineError::DurationUnparseable(trimmed.to_string()));
    }
    Ok(duration)
}
