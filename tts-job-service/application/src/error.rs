use thiserror::Error;

use tts_job_domain::{DomainError, ModelFailure};

use crate::JobErrorOutput;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputValidationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No text provided")]
    MissingText,

    #[error("Text too long: {length} characters (maximum {maximum} characters)")]
    TextTooLong { length: usize, maximum: usize },

    #[error("Invalid voice sample: {0}")]
    InvalidEncoding(String),

    #[error("Voice sample is empty")]
    EmptyVoiceSample,

    #[error("Invalid audio file: {0}")]
    UndecodableAudio(String),

    #[error("Voice sample too short: {duration_seconds:.1}s (minimum {minimum_seconds:.1}s required)")]
    VoiceSampleTooShort {
        duration_seconds: f32,
        minimum_seconds: f32,
    },

    #[error("Unsupported voice sample format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    TransientResourceExhaustion,
    ModelPreconditionViolation,
    InternalInferenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputValidation => "input_validation_error",
            ErrorKind::TransientResourceExhaustion => "transient_resource_exhaustion",
            ErrorKind::ModelPreconditionViolation => "model_precondition_violation",
            ErrorKind::InternalInferenceFailure => "internal_inference_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientResourceExhaustion)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplicationError {
    #[error("{0}")]
    InputValidation(#[from] InputValidationError),

    #[error("GPU out of memory. Please try with shorter text or wait and retry. ({0})")]
    TransientResourceExhaustion(String),

    #[error("Generation failed: {0}")]
    ModelPreconditionViolation(String),

    #[error("Audio generation failed: {0}")]
    InternalInferenceFailure(String),
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::InputValidation(_) => ErrorKind::InputValidation,
            ApplicationError::TransientResourceExhaustion(_) => {
                ErrorKind::TransientResourceExhaustion
            }
            ApplicationError::ModelPreconditionViolation(_) => {
                ErrorKind::ModelPreconditionViolation
            }
            ApplicationError::InternalInferenceFailure(_) => ErrorKind::InternalInferenceFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn to_output(&self) -> JobErrorOutput {
        JobErrorOutput {
            error: self.to_string(),
            error_type: self.kind().as_str().to_string(),
            retryable: self.is_retryable(),
        }
    }
}

impl From<DomainError> for ApplicationError {
    fn from(error: DomainError) -> Self {
        ApplicationError::InternalInferenceFailure(error.to_string())
    }
}

impl From<ModelFailure> for ApplicationError {
    fn from(failure: ModelFailure) -> Self {
        match failure {
            ModelFailure::OutOfMemory(detail) => {
                ApplicationError::TransientResourceExhaustion(detail)
            }
            ModelFailure::PreconditionViolation(detail) => {
                ApplicationError::ModelPreconditionViolation(detail)
            }
            ModelFailure::Internal(detail) => ApplicationError::InternalInferenceFailure(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_exhaustion_is_retryable() {
        let oom = ApplicationError::TransientResourceExhaustion("CUDA OOM".to_string());
        let short = ApplicationError::from(InputValidationError::VoiceSampleTooShort {
            duration_seconds: 3.2,
            minimum_seconds: 5.0,
        });
        let precondition = ApplicationError::ModelPreconditionViolation("bad".to_string());

        assert!(oom.is_retryable());
        assert!(!short.is_retryable());
        assert!(!precondition.is_retryable());
    }

    #[test]
    fn too_short_message_reports_both_durations() {
        let err = InputValidationError::VoiceSampleTooShort {
            duration_seconds: 3.2,
            minimum_seconds: 5.0,
        };
        assert_eq!(
            err.to_string(),
            "Voice sample too short: 3.2s (minimum 5.0s required)"
        );
    }

    #[test]
    fn output_carries_classification() {
        let output = ApplicationError::from(ModelFailure::OutOfMemory("42 MiB".to_string()))
            .to_output();

        assert_eq!(output.error_type, "transient_resource_exhaustion");
        assert!(output.retryable);
        assert!(output.error.starts_with("GPU out of memory"));
    }

    #[test]
    fn domain_errors_become_internal_failures() {
        let err = ApplicationError::from(DomainError::storage_error("disk full"));
        assert_eq!(err.kind(), ErrorKind::InternalInferenceFailure);
    }
}
