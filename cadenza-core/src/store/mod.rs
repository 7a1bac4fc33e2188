use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::BucketSection;
use crate::pipeline::{PipelineError, PipelineResult};

/// Reads one named object into a local file.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> PipelineResult<()>;
}

/// Writes one local file to an object key.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> PipelineResult<()>;
}

/// S3-compatible client (MinIO in the original deployment), addressed by
/// endpoint URL with static credentials and path-style buckets.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(section: &BucketSection) -> Self {
        let credentials = Credentials::new(
            section.access_key.clone(),
            section.secret_key.clone(),
            None,
            None,
            "cadenza-config",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&section.url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectFetcher for S3Store {
    async fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> PipelineResult<()> {
        let fetch_failed = |reason: String| PipelineError::FetchFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| fetch_failed(err.to_string()))?;
        stream_to_file(response.body, dest)
            .await
            .map_err(fetch_failed)
    }
}

/// Streams an object body to disk chunk by chunk; sources are lossless
/// audio files that can run to hundreds of megabytes, so the whole body is
/// never buffered in memory.
async fn stream_to_file(
    mut body: ByteStream,
    dest: &Path,
) -> std::result::Result<(), String> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|err| err.to_string())?;
    while let Some(bytes) = body.try_next().await.map_err(|err| err.to_string())? {
        file.write_all(&bytes).await.map_err(|err| err.to_string())?;
    }
    file.flush().await.map_err(|err| err.to_string())
}

#[async_trait]
impl ObjectSink for S3Store {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> PipelineResult<()> {
        let upload_failed = |reason: String| PipelineError::UploadFailed {
            key: key.to_string(),
            reason,
        };
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| upload_failed(err.to_string()))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| upload_failed(err.to_string()))?;
        Ok(())
    }
}

/// Walks `root` and uploads every regular file to `<song_key>/<relative>`.
///
/// Directories are not objects, symlinks are not followed, and nothing is
/// rolled back on failure: the destination is append-only and a re-run with
/// the same song key overwrites each file.
pub async fn upload_tree(
    sink: &dyn ObjectSink,
    root: &Path,
    bucket: &str,
    song_key: &str,
    cancel: &CancellationToken,
) -> PipelineResult<usize> {
    let mut uploaded = 0usize;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| PipelineError::UploadFailed {
            key: song_key.to_string(),
            reason: err.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| PipelineError::Internal(err.to_string()))?;
        let key = object_key(song_key, relative);
        debug!(%key, "uploading artifact");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = sink.put_file(bucket, &key, entry.path()) => result?,
        }
        uploaded += 1;
    }
    Ok(uploaded)
}

/// Object keys always use forward slashes, whatever the local separator.
fn object_key(song_key: &str, relative: &Path) -> String {
    let mut key = String::from(song_key);
    for component in relative.components() {
        key.push('/');
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    key
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        keys: Mutex<Vec<String>>,
        fail_key: Option<String>,
    }

    #[async_trait]
    impl ObjectSink for RecordingSink {
        async fn put_file(&self, _bucket: &str, key: &str, path: &Path) -> PipelineResult<()> {
            if self.fail_key.as_deref() == Some(key) {
                return Err(PipelineError::UploadFailed {
                    key: key.to_string(),
                    reason: "synthetic".into(),
                });
            }
            assert!(path.is_file());
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn make_tree(root: &Path) {
        std::fs::write(root.join("master.m3u8"), b"#EXTM3U\n").unwrap();
        for bitrate in ["64000", "128000"] {
            let dir = root.join(bitrate);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("chunk_001.m4s"), b"seg").unwrap();
            std::fs::write(dir.join("playlist_001.m3u8"), b"#EXTM3U\n").unwrap();
        }
    }

    #[tokio::test]
    async fn uploads_every_regular_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        make_tree(dir.path());
        let sink = RecordingSink::default();
        let count = upload_tree(
            &sink,
            dir.path(),
            "encoded-audio",
            "a/b",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(count, 5);
        let mut keys = sink.keys.into_inner().unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "a/b/128000/chunk_001.m4s",
                "a/b/128000/playlist_001.m3u8",
                "a/b/64000/chunk_001.m4s",
                "a/b/64000/playlist_001.m3u8",
                "a/b/master.m3u8",
            ]
        );
    }

    #[tokio::test]
    async fn first_upload_error_aborts_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        make_tree(dir.path());
        let sink = RecordingSink {
            keys: Mutex::new(Vec::new()),
            fail_key: Some("a/b/master.m3u8".into()),
        };
        let err = upload_tree(
            &sink,
            dir.path(),
            "encoded-audio",
            "a/b",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_uploads() {
        let dir = tempfile::tempdir().unwrap();
        make_tree(dir.path());
        let sink = RecordingSink::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = upload_tree(&sink, dir.path(), "encoded-audio", "a/b", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(sink.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_to_file_writes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source");
        let body = ByteStream::from_static(b"lossless audio bytes");
        stream_to_file(body, &dest).await.unwrap();
        assert_eq!(
            tokio::fs::read(&dest).await.unwrap(),
            b"lossless audio bytes"
        );
    }

    #[tokio::test]
    async fn stream_to_file_reports_unwritable_dest() {
        let body = ByteStream::from_static(b"data");
        let err = stream_to_file(body, Path::new("/nonexistent/cadenza/source"))
            .await
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn object_keys_use_forward_slashes() {
        let key = object_key("a/b", &PathBuf::from("128000").join("chunk_001.m4s"));
        assert_eq!(key, "a/b/128000/chunk_001.m4s");
    }
}
