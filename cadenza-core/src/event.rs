use serde::Deserialize;

use crate::pipeline::{Job, PipelineError, PipelineResult};

/// Object-store notification envelope, the standard "records" shape.
///
/// Only the first record's object key is consumed; the source and
/// destination buckets come from service configuration, not from the
/// event. Unknown fields are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventRecord {
    s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
struct S3Entity {
    #[serde(default)]
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BucketEntity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectEntity {
    key: String,
}

impl StorageEvent {
    pub fn from_json(raw: &str) -> PipelineResult<Self> {
        let event: StorageEvent = serde_json::from_str(raw)
            .map_err(|err| PipelineError::InvalidEvent(err.to_string()))?;
        if event.object_key().is_none() {
            return Err(PipelineError::InvalidEvent(
                "event contains no object key".into(),
            ));
        }
        Ok(event)
    }

    pub fn object_key(&self) -> Option<&str> {
        self.records
            .first()
            .map(|record| record.s3.object.key.as_str())
            .filter(|key| !key.is_empty())
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.records
            .first()
            .map(|record| record.s3.bucket.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Builds the job for this event; bucket identities come from routing
    /// configuration.
    pub fn into_job(self, source_bucket: &str, destination_bucket: &str) -> PipelineResult<Job> {
        let key = self
            .object_key()
            .ok_or_else(|| PipelineError::InvalidEvent("event contains no object key".into()))?;
        Ok(Job::new(source_bucket, key, destination_bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_records_envelope() {
        let raw = r#"{
            "EventName": "s3:ObjectCreated:Put",
            "Records": [{
                "eventVersion": "2.0",
                "eventSource": "minio:s3",
                "s3": {
                    "bucket": {"name": "raw-audio", "arn": "arn:aws:s3:::raw-audio"},
                    "object": {"key": "acts/blue/track.flac", "size": 1048576}
                },
                "responseElements": {"x-amz-request-id": "17"}
            }]
        }"#;
        let event = StorageEvent::from_json(raw).unwrap();
        assert_eq!(event.object_key(), Some("acts/blue/track.flac"));
        assert_eq!(event.bucket_name(), Some("raw-audio"));
        let job = event.into_job("raw-audio", "encoded-audio").unwrap();
        assert_eq!(job.song_key, "acts/blue/track");
        assert_eq!(job.source_object, "acts/blue/track.flac");
        assert_eq!(job.destination_bucket, "encoded-audio");
    }

    #[test]
    fn missing_records_is_invalid() {
        let err = StorageEvent::from_json(r#"{"Records": []}"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEvent(_)));
        let err = StorageEvent::from_json(r#"{}"#).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEvent(_)));
    }

    #[test]
    fn empty_key_is_invalid() {
        let raw = r#"{"Records": [{"s3": {"object": {"key": ""}}}]}"#;
        assert!(StorageEvent::from_json(raw).is_err());
    }

    #[test]
    fn undecodable_body_is_invalid() {
        assert!(StorageEvent::from_json("not json").is_err());
    }
}
