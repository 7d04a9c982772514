use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tts_job_domain::{
    GenerationParams, GenerationRequest, ModelFailure, SpeechModelPort, TextChunk, Waveform,
};

use crate::error::ApplicationError;
use crate::resource::JobResources;

pub type InferenceResult = Result<Waveform, ApplicationError>;

/// Runs the model once per chunk and classifies whatever comes back.
pub struct InferenceInvoker {
    model: Arc<dyn SpeechModelPort>,
    params: GenerationParams,
}

impl InferenceInvoker {
    pub fn new(model: Arc<dyn SpeechModelPort>, params: GenerationParams) -> Self {
        Self { model, params }
    }

    pub async fn invoke(
        &self,
        chunk: &TextChunk,
        reference: Option<&Path>,
        resources: &mut JobResources,
    ) -> InferenceResult {
        let request = GenerationRequest {
            text: chunk.text.clone(),
            audio_prompt_path: reference.map(Path::to_path_buf),
            params: self.params.clone(),
        };

        let started = Instant::now();
        let outcome = self.model.generate(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(waveform) => {
                if waveform.is_empty() {
                    tracing::error!(
                        request_id = %resources.request_id(),
                        chunk = chunk.index,
                        model = self.model.name(),
                        "model returned no samples"
                    );
                    return Err(ApplicationError::InternalInferenceFailure(
                        "Generated audio is empty".to_string(),
                    ));
                }
                if waveform.sample_rate_hz == 0 {
                    return Err(ApplicationError::InternalInferenceFailure(
                        "model declared a zero sample rate".to_string(),
                    ));
                }

                tracing::debug!(
                    request_id = %resources.request_id(),
                    chunk = chunk.index,
                    chars = chunk.char_count(),
                    samples = waveform.len(),
                    sample_rate_hz = waveform.sample_rate_hz,
                    elapsed_ms,
                    "chunk synthesized"
                );
                Ok(waveform)
            }
            Err(ModelFailure::OutOfMemory(detail)) => {
                tracing::error!(
                    request_id = %resources.request_id(),
                    chunk = chunk.index,
                    detail = %detail,
                    elapsed_ms,
                    "accelerator out of memory"
                );
                resources.reclaim_accelerator().await;
                Err(ApplicationError::TransientResourceExhaustion(detail))
            }
            Err(failure) => {
                tracing::error!(
                    request_id = %resources.request_id(),
                    chunk = chunk.index,
                    error = %failure,
                    elapsed_ms,
                    "model call failed"
                );
                Err(failure.into())
            }
        }
    }
}
