use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::{stderr_tail, PipelineError, PipelineResult};
use super::types::Chunk;

/// Produces one (bitrate, chunk) rendition: a fMP4 segment plus its
/// per-chunk media playlist, written into `rendition_dir`.
#[async_trait]
pub trait ChunkEncoder: Send + Sync {
    async fn encode(
        &self,
        source: &Path,
        chunk: &Chunk,
        bitrate: u32,
        rendition_dir: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<()>;
}

/// Drives the external encoder binary (ffmpeg by default).
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The exact invocation, kept reproducible: audio-only AAC-LC, stereo,
    /// 48 kHz, integer-rounded start/duration, VOD fMP4 HLS output.
    fn build_args(source: &Path, chunk: &Chunk, bitrate: u32, rendition_dir: &Path) -> Vec<String> {
        let segment_template = rendition_dir.join("chunk_%03d.m4s");
        let playlist_path = rendition_dir.join(chunk.playlist_name());
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-vn".into(),
            "-i".into(),
            source.display().to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            bitrate.to_string(),
            "-ac".into(),
            "2".into(),
            "-ar".into(),
            "48000".into(),
            "-profile:a".into(),
            "aac_low".into(),
            "-ss".into(),
            format!("{:.0}", chunk.start_seconds),
            "-t".into(),
            format!("{:.0}", chunk.duration_seconds),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            "10".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
            "-hls_segment_type".into(),
            "fmp4".into(),
            // Segment numbering starts at the chunk index so parallel
            // invocations into the same rendition dir never collide.
            "-start_number".into(),
            chunk.index.to_string(),
            "-hls_segment_filename".into(),
            segment_template.display().to_string(),
            playlist_path.display().to_string(),
        ]
    }
}

#[async_trait]
impl ChunkEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        source: &Path,
        chunk: &Chunk,
        bitrate: u32,
        rendition_dir: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        tokio::fs::create_dir_all(rendition_dir)
            .await
            .map_err(|err| PipelineError::Internal(err.to_string()))?;

        let mut command = Command::new(&self.binary);
        command
            .kill_on_drop(true)
            .args(Self::build_args(source, chunk, bitrate, rendition_dir));

        // Dropping the output future on cancellation kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = command.output() => result,
        };

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::EncoderUnavailable(self.binary.clone()));
            }
            Err(err) => return Err(PipelineError::Internal(err.to_string())),
        };

        if !output.status.success() {
            return Err(PipelineError::EncoderFailed {
                bitrate,
                chunk: chunk.index,
                status: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let playlist_path = rendition_dir.join(chunk.playlist_name());
        match tokio::fs::metadata(&playlist_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(PipelineError::EncoderOutputMissing {
                path: playlist_path,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, start: f64, duration: f64) -> Chunk {
        Chunk {
            index,
            start_seconds: start,
            duration_seconds: duration,
        }
    }

    #[test]
    fn args_match_the_encoder_contract() {
        let args = FfmpegEncoder::build_args(
            Path::new("/staging/source.flac"),
            &chunk(2, 10.0, 10.0),
            128_000,
            Path::new("/staging/128000"),
        );
        let expected: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-vn",
            "-i",
            "/staging/source.flac",
            "-c:a",
            "aac",
            "-b:a",
            "128000",
            "-ac",
            "2",
            "-ar",
            "48000",
            "-profile:a",
            "aac_low",
            "-ss",
            "10",
            "-t",
            "10",
            "-f",
            "hls",
            "-hls_time",
            "10",
            "-hls_playlist_type",
            "vod",
            "-hls_segment_type",
            "fmp4",
            "-start_number",
            "2",
            "-hls_segment_filename",
            "/staging/128000/chunk_%03d.m4s",
            "/staging/128000/playlist_002.m3u8",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn start_and_duration_are_integer_rounded() {
        let args = FfmpegEncoder::build_args(
            Path::new("/in.flac"),
            &chunk(3, 20.0, 5.4),
            64_000,
            Path::new("/out/64000"),
        );
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[ss + 1], "20");
        assert_eq!(args[t + 1], "5");
    }

    #[tokio::test]
    async fn clean_exit_without_playlist_is_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        // `true` exits 0 and writes nothing, like an encoder that silently
        // produced no playlist.
        let encoder = FfmpegEncoder::new("true");
        let cancel = CancellationToken::new();
        let err = encoder
            .encode(
                Path::new("/dev/null"),
                &chunk(1, 0.0, 10.0),
                64_000,
                dir.path(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EncoderOutputMissing { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new("cadenza-no-such-encoder");
        let cancel = CancellationToken::new();
        let err = encoder
            .encode(
                Path::new("/dev/null"),
                &chunk(1, 0.0, 10.0),
                64_000,
                dir.path(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EncoderUnavailable(_)));
    }
}
