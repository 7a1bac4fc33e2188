use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CadenzaConfig {
    pub service: ServiceSection,
    pub source_bucket: BucketSection,
    pub destination_bucket: BucketSection,
    #[serde(default)]
    pub transcode: TranscodeSection,
}

impl CadenzaConfig {
    /// Rejects configurations the pipeline cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.transcode.ladder_bitrates.is_empty() {
            return Err(ConfigError::Invalid(
                "ladder_bitrates must not be empty".into(),
            ));
        }
        if self.transcode.chunk_size_seconds == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Endpoint and credentials for one S3-compatible bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketSection {
    pub url: String,
    pub name: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeSection {
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_seconds: u32,
    #[serde(default = "default_ladder")]
    pub ladder_bitrates: Vec<u32>,
    #[serde(default = "default_encoder_binary")]
    pub encoder_binary: String,
    #[serde(default = "default_prober_binary")]
    pub prober_binary: String,
    /// 0 means one encode task per available CPU core.
    #[serde(default)]
    pub max_concurrency: usize,
    pub job_timeout_seconds: Option<u64>,
}

impl TranscodeSection {
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for TranscodeSection {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            chunk_size_seconds: default_chunk_size(),
            ladder_bitrates: default_ladder(),
            encoder_binary: default_encoder_binary(),
            prober_binary: default_prober_binary(),
            max_concurrency: 0,
            job_timeout_seconds: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("/tmp/cadenza-staging")
}

fn default_chunk_size() -> u32 {
    10
}

fn default_ladder() -> Vec<u32> {
    vec![64_000, 128_000, 192_000]
}

fn default_encoder_binary() -> String {
    "ffmpeg".into()
}

fn default_prober_binary() -> String {
    "ffprobe".into()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CadenzaConfig> {
    let config: CadenzaConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
