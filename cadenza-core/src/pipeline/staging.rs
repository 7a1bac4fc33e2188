use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};

/// Per-job scratch directory under the configured staging root.
///
/// The root embeds a fresh UUID so concurrent jobs never collide, and every
/// job directory sits under one well-known prefix so an external reaper can
/// reclaim leftovers after a crash. `release` removes the whole tree and is
/// safe to call more than once; `Drop` makes a best-effort pass for exit
/// paths that skip it.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    source: PathBuf,
    tree: PathBuf,
    released: bool,
}

impl StagingArea {
    pub async fn acquire(staging_root: &Path, song_key: &str) -> PipelineResult<Self> {
        let dir_name = format!("{}-{}", sanitize(song_key), Uuid::new_v4());
        let root = staging_root.join(dir_name);
        let tree = root.join("hls");
        fs::create_dir_all(&tree)
            .await
            .map_err(|err| PipelineError::Internal(format!("create staging dir: {err}")))?;
        let source = root.join("source");
        Ok(Self {
            root,
            source,
            tree,
            released: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path at which the raw object is materialised.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Root of the produced HLS tree: per-bitrate rendition directories
    /// plus the master playlist. This is the directory that gets uploaded;
    /// the raw source stays outside it.
    pub fn tree_root(&self) -> &Path {
        &self.tree
    }

    /// Directory for one bitrate's segments and playlists, created on
    /// first use. Stable for the life of the job.
    pub async fn rendition_dir(&self, bitrate: u32) -> PipelineResult<PathBuf> {
        let dir = self.tree.join(bitrate.to_string());
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| PipelineError::Internal(format!("create rendition dir: {err}")))?;
        Ok(dir)
    }

    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = fs::remove_dir_all(&self.root).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), error = %err, "failed to clean staging directory");
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}

/// Song keys may contain path separators; flatten them for the directory name.
fn sanitize(song_key: &str) -> String {
    song_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
