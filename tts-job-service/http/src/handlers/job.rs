use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use tts_job_application::{SynthesisJobEnvelope, SynthesisJobResponse};

use crate::error::{rejection_mapper, HttpError};
use crate::AppState;

/// Runs one job synchronously. Every job outcome, including failures, is a
/// `200` with exactly one JSON body; only unparseable requests are rejected.
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<SynthesisJobEnvelope>, JsonRejection>,
) -> Result<(StatusCode, Json<SynthesisJobResponse>), HttpError> {
    let Json(envelope) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "rejected malformed job request");
        rejection_mapper(rejection)
    })?;

    tracing::info!(
        request_id = envelope.id.as_deref().unwrap_or("auto"),
        text_chars = envelope
            .input
            .text
            .as_deref()
            .or(envelope.input.prompt.as_deref())
            .map(|text| text.chars().count())
            .unwrap_or(0),
        has_reference = envelope.input.reference_audio_base64.is_some(),
        "received job request"
    );

    let response = state.usecase.run(envelope).await;
    match &response {
        SynthesisJobResponse::Success(output) => {
            tracing::info!(sample_rate = output.sample_rate, "job request completed")
        }
        SynthesisJobResponse::Failure(error) => tracing::info!(
            error_type = %error.error_type,
            retryable = error.retryable,
            "job request answered with error"
        ),
    }

    Ok((StatusCode::OK, Json(response)))
}
