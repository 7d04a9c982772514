use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use tts_job_domain::Job;

/// Envelope the orchestration layer wraps every job in.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SynthesisJobEnvelope {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(nested)]
    pub input: SynthesisJobInput,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SynthesisJobInput {
    pub text: Option<String>,
    /// Accepted in place of `text` for older callers.
    pub prompt: Option<String>,
    pub reference_audio_base64: Option<String>,
}

impl SynthesisJobEnvelope {
    pub fn new(input: SynthesisJobInput) -> Self {
        Self { id: None, input }
    }

    pub fn into_job(self) -> Job {
        let request_id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let text = match self.input.text {
            Some(text) if !text.is_empty() => Some(text),
            _ => self.input.prompt,
        };
        let reference_audio_base64 = self
            .input
            .reference_audio_base64
            .filter(|encoded| !encoded.is_empty());

        Job {
            request_id,
            text,
            reference_audio_base64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisJobOutput {
    pub audio_base64: String,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobErrorOutput {
    pub error: String,
    pub error_type: String,
    pub retryable: bool,
}

/// Exactly one of these is returned per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SynthesisJobResponse {
    Success(SynthesisJobOutput),
    Failure(JobErrorOutput),
}

impl SynthesisJobResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SynthesisJobResponse::Success(_))
    }
}
