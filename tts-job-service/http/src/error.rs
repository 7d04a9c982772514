use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Transport-level failures. Job failures never use this type: they are
/// answered with a structured job response instead.
#[derive(Debug)]
pub enum HttpError {
    BadRequest { message: String },
    PayloadTooLarge { message: String },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            HttpError::PayloadTooLarge { message } => (StatusCode::PAYLOAD_TOO_LARGE, message),
        };

        (
            status,
            Json(json!({
                "error": message,
            })),
        )
            .into_response()
    }
}

pub fn rejection_mapper(rejection: JsonRejection) -> HttpError {
    let message = rejection.body_text();
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge { message }
    } else {
        HttpError::BadRequest { message }
    }
}
