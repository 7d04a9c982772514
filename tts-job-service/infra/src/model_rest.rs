use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use tts_job_domain::{
    AudioCodecPort, DomainError, GenerationParams, GenerationRequest, ModelFailure, ModelInfo,
    SpeechModelPort, Waveform,
};

use crate::codec::AudioFileCodec;

const SERVICE: &str = "tts-model";

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_prompt_path: Option<&'a PathBuf>,
    params: &'a GenerationParams,
}

#[derive(Debug, Deserialize)]
struct ModelErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoBody {
    sample_rate: u32,
    #[serde(default)]
    name: Option<String>,
}

/// Speech model served over HTTP by a separate runtime process.
///
/// `POST /v1/generate` answers with WAV bytes on success and a JSON
/// `{error, kind?}` body otherwise.
pub struct RestSpeechModel {
    client: Client,
    endpoint: String,
    codec: AudioFileCodec,
}

impl RestSpeechModel {
    pub fn new(
        endpoint: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| DomainError::external_service_error(SERVICE, &err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            codec: AudioFileCodec::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

#[async_trait]
impl SpeechModelPort for RestSpeechModel {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn describe(&self) -> Result<ModelInfo, DomainError> {
        let response = self
            .client
            .get(self.url("/v1/info"))
            .send()
            .await
            .map_err(|err| DomainError::external_service_error(SERVICE, &err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::external_service_error(
                SERVICE,
                &format!("model info request failed with status {status}"),
            ));
        }

        let info: InfoBody = response
            .json()
            .await
            .map_err(|err| DomainError::external_service_error(SERVICE, &err.to_string()))?;

        Ok(ModelInfo {
            name: info.name.unwrap_or_else(|| SERVICE.to_string()),
            sample_rate_hz: info.sample_rate,
        })
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Waveform, ModelFailure> {
        let payload = GeneratePayload {
            text: &request.text,
            audio_prompt_path: request.audio_prompt_path.as_ref(),
            params: &request.params,
        };

        let response = self
            .client
            .post(self.url("/v1/generate"))
            .json(&payload)
            .send()
            .await
            .map_err(|err| ModelFailure::Internal(format!("model request failed: {err}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ModelFailure::Internal(format!("model response unreadable: {err}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let decoded = self
            .codec
            .decode(&body)
            .map_err(|err| ModelFailure::Internal(format!("model returned invalid audio: {err}")))?;

        tracing::debug!(
            samples = decoded.samples.len(),
            sample_rate_hz = decoded.sample_rate_hz,
            "model generation succeeded"
        );

        Ok(Waveform::new(decoded.samples, decoded.sample_rate_hz))
    }
}

fn classify_failure(status: StatusCode, body: &[u8]) -> ModelFailure {
    let (message, kind) = match serde_json::from_slice::<ModelErrorBody>(body) {
        Ok(parsed) => (parsed.error, parsed.kind),
        Err(_) => (String::from_utf8_lossy(body).trim().to_string(), None),
    };
    let message = if message.is_empty() {
        format!("model responded with status {status}")
    } else {
        message
    };

    match kind.as_deref() {
        Some("out_of_memory") => ModelFailure::OutOfMemory(message),
        Some("precondition") => ModelFailure::PreconditionViolation(message),
        Some(_) => ModelFailure::Internal(message),
        None => match status {
            StatusCode::INSUFFICIENT_STORAGE => ModelFailure::OutOfMemory(message),
            StatusCode::UNPROCESSABLE_ENTITY => ModelFailure::PreconditionViolation(message),
            _ => ModelFailure::Internal(message),
        },
    }
}
