use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{service} service error: {message}")]
    ExternalService { service: String, message: String },

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio encode error: {0}")]
    AudioEncode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn internal_error(message: &str) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn external_service_error(service: &str, message: &str) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    pub fn audio_decode_error(message: &str) -> Self {
        Self::AudioDecode(message.to_string())
    }

    pub fn audio_encode_error(message: &str) -> Self {
        Self::AudioEncode(message.to_string())
    }

    pub fn storage_error(message: &str) -> Self {
        Self::Storage(message.to_string())
    }
}

/// How a generation call failed, as reported by the model runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFailure {
    #[error("accelerator out of memory: {0}")]
    OutOfMemory(String),

    #[error("model precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("model failure: {0}")]
    Internal(String),
}
