use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cadenza_core::{CadenzaConfig, Pipeline, PipelineError, StorageEvent};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    config: Arc<CadenzaConfig>,
    cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        config: Arc<CadenzaConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            config,
            cancel,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transcode", post(transcode))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn transcode(State(state): State<AppState>, body: String) -> Response {
    let event = match StorageEvent::from_json(&body) {
        Ok(event) => event,
        Err(err) => return error_response(&err),
    };
    let job = match event.into_job(
        &state.config.source_bucket.name,
        &state.config.destination_bucket.name,
    ) {
        Ok(job) => job,
        Err(err) => return error_response(&err),
    };

    info!(song_key = %job.song_key, "notification accepted");
    match state.pipeline.run(&job, &state.cancel).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &PipelineError) -> Response {
    let body = serde_json::json!({ "error": err.to_string() });
    (status_for(err), Json(body)).into_response()
}

fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_events_map_to_bad_request() {
        let err = PipelineError::InvalidEvent("no key".into());
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cancellation_maps_to_service_unavailable() {
        assert_eq!(
            status_for(&PipelineError::Cancelled),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn pipeline_failures_map_to_internal_error() {
        let err = PipelineError::EncoderUnavailable("ffmpeg".into());
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
