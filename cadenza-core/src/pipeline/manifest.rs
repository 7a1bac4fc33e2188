use std::path::{Path, PathBuf};

use tokio::fs;

use super::error::{PipelineError, PipelineResult};

pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";

/// Writes `master.m3u8` at the staging root, one stream entry per
/// (bitrate, chunk) media playlist.
///
/// Ordering is load-bearing: outer loop over bitrates in ladder order,
/// inner loop over chunk indices ascending, so the bytes are deterministic
/// and downstream caches can hash them. The file lands via a temp name and
/// rename so a failed write never leaves a half-written master.
pub async fn write_master(
    root: &Path,
    bitrates: &[u32],
    num_chunks: usize,
) -> PipelineResult<PathBuf> {
    let contents = render_master(bitrates, num_chunks);
    let path = root.join(MASTER_PLAYLIST_NAME);
    let tmp = root.join(format!("{MASTER_PLAYLIST_NAME}.tmp"));
    fs::write(&tmp, contents.as_bytes())
        .await
        .map_err(|err| PipelineError::ManifestWriteFailed(err.to_string()))?;
    fs::rename(&tmp, &path)
        .await
        .map_err(|err| PipelineError::ManifestWriteFailed(err.to_string()))?;
    Ok(path)
}

fn render_master(bitrates: &[u32], num_chunks: usize) -> String {
    let mut out = String::from("#EXTM3U\n");
    for &bitrate in bitrates {
        for index in 1..=num_chunks {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={bitrate}\n{bitrate}/playlist_{index:03}.m3u8\n"
            ));
        }
    }
    out
}
