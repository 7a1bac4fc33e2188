pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod store;

pub use config::{load_config, BucketSection, CadenzaConfig, ServiceSection, TranscodeSection};
pub use error::{ConfigError, Result};
pub use event::StorageEvent;
pub use pipeline::{
    plan_chunks, run_ladder, song_key_for, write_master, Chunk, ChunkEncoder, FfmpegEncoder,
    FfprobeProber, Job, JobReport, MediaProber, Pipeline, PipelineError, PipelineResult,
    StagingArea, MASTER_PLAYLIST_NAME,
};
pub use store::{upload_tree, ObjectFetcher, ObjectSink, S3Store};
