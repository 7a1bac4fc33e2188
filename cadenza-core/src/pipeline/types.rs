use std::path::Path;

/// One transcoding job, decoded from an object-store notification.
///
/// Lives for a single pipeline run; the song key doubles as the
/// destination prefix for every uploaded artifact.
#[derive(Debug, Clone)]
pub struct Job {
    pub song_key: String,
    pub source_bucket: String,
    pub source_object: String,
    pub destination_bucket: String,
}

impl Job {
    pub fn new(
        source_bucket: impl Into<String>,
        source_object: impl Into<String>,
        destination_bucket: impl Into<String>,
    ) -> Self {
        let source_object = source_object.into();
        let song_key = song_key_for(&source_object);
        Self {
            song_key,
            source_bucket: source_bucket.into(),
            source_object,
            destination_bucket: destination_bucket.into(),
        }
    }
}

/// Strips the file extension from an object key, keeping any path
/// components, so `acts/blue/track.flac` becomes `acts/blue/track`.
pub fn song_key_for(object_key: &str) -> String {
    let path = Path::new(object_key);
    match (path.parent(), path.file_stem()) {
        (Some(parent), Some(stem)) if !parent.as_os_str().is_empty() => {
            format!("{}/{}", parent.display(), stem.to_string_lossy())
        }
        (_, Some(stem)) => stem.to_string_lossy().into_owned(),
        _ => object_key.to_string(),
    }
}

/// Immutable plan element: a time-aligned slice of the source audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based, dense.
    pub index: u32,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl Chunk {
    /// `playlist_NNN.m3u8`, the name the encoder emits for this chunk.
    pub fn playlist_name(&self) -> String {
        format!("playlist_{:03}.m3u8", self.index)
    }
}

/// Summary of one completed job, for logging and the HTTP response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobReport {
    pub song_key: String,
    pub duration_seconds: f64,
    pub chunks: usize,
    pub ladder: Vec<u32>,
    pub files_uploaded: usize,
}
