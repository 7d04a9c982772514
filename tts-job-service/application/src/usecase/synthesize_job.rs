use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::Instrument;
use validator::Validate;

use tts_job_domain::{
    AcceleratorPort, AudioCodecPort, GenerationParams, Job, JobLifecycle, JobState,
    SpeechModelPort, DEFAULT_CHUNK_MAX_CHARS, MIN_VOICE_SAMPLE_SECONDS,
};

use crate::assembly::{ArtifactEncoder, ResultAssembler};
use crate::chunking::ChunkPlanner;
use crate::dto::{SynthesisJobEnvelope, SynthesisJobOutput, SynthesisJobResponse};
use crate::error::{ApplicationError, InputValidationError};
use crate::inference::InferenceInvoker;
use crate::resource::{JobOutcome, JobResources};
use crate::validation::InputValidator;

pub const DEFAULT_MAX_TEXT_CHARS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub chunk_max_chars: usize,
    pub min_voice_seconds: f32,
    pub max_text_chars: usize,
    pub scratch_root: Option<PathBuf>,
    pub output_sample_rate_hz: Option<u32>,
    pub generation: GenerationParams,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            min_voice_seconds: MIN_VOICE_SAMPLE_SECONDS,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            scratch_root: None,
            output_sample_rate_hz: None,
            generation: GenerationParams::default(),
        }
    }
}

#[async_trait]
pub trait SynthesizeJobUseCase: Send + Sync {
    async fn synthesize(&self, job: Job) -> Result<SynthesisJobOutput, ApplicationError>;

    /// Runs one envelope end to end. Never fails: every error, including a
    /// panic inside the pipeline, becomes a structured failure response.
    async fn run(&self, envelope: SynthesisJobEnvelope) -> SynthesisJobResponse {
        if let Err(err) = envelope.validate() {
            let error = ApplicationError::from(InputValidationError::InvalidRequest(
                err.to_string().replace('\n', "; "),
            ));
            return SynthesisJobResponse::Failure(error.to_output());
        }

        let job = envelope.into_job();
        let request_id = job.request_id.clone();

        match AssertUnwindSafe(self.synthesize(job)).catch_unwind().await {
            Ok(Ok(output)) => SynthesisJobResponse::Success(output),
            Ok(Err(err)) => SynthesisJobResponse::Failure(err.to_output()),
            Err(_) => {
                tracing::error!(request_id = %request_id, "job panicked");
                let error =
                    ApplicationError::InternalInferenceFailure("Unexpected error".to_string());
                SynthesisJobResponse::Failure(error.to_output())
            }
        }
    }
}

pub struct SynthesizeJobUseCaseImpl {
    accelerator: Arc<dyn AcceleratorPort>,
    validator: InputValidator,
    planner: ChunkPlanner,
    invoker: InferenceInvoker,
    encoder: ArtifactEncoder,
    scratch_root: Option<PathBuf>,
}

impl SynthesizeJobUseCaseImpl {
    pub fn new(
        model: Arc<dyn SpeechModelPort>,
        accelerator: Arc<dyn AcceleratorPort>,
        codec: Arc<dyn AudioCodecPort>,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            accelerator,
            validator: InputValidator::new(
                codec.clone(),
                settings.min_voice_seconds,
                settings.max_text_chars,
            ),
            planner: ChunkPlanner::new(settings.chunk_max_chars),
            invoker: InferenceInvoker::new(model, settings.generation),
            encoder: ArtifactEncoder::new(codec, settings.output_sample_rate_hz),
            scratch_root: settings.scratch_root,
        }
    }

    async fn execute(
        &self,
        job: Job,
        lifecycle: &mut JobLifecycle,
        resources: &mut JobResources,
    ) -> Result<SynthesisJobOutput, ApplicationError> {
        lifecycle.advance(JobState::Validating)?;
        let validated = self.validator.validate(job, resources)?;

        lifecycle.advance(JobState::Planning)?;
        let chunks = self.planner.plan(&validated.text);
        let total = chunks.len();
        tracing::info!(
            request_id = %validated.request_id,
            chunks = total,
            max_chars = self.planner.max_chars(),
            "planned text chunks"
        );

        let reference = validated
            .reference_voice
            .as_ref()
            .map(|voice| voice.path.as_path());
        let mut assembler = ResultAssembler::with_capacity(total);

        for chunk in &chunks {
            lifecycle.advance(JobState::Invoking {
                chunk: chunk.index + 1,
                total,
            })?;
            if chunk.is_blank() {
                tracing::debug!(
                    request_id = %validated.request_id,
                    chunk = chunk.index,
                    chars = chunk.char_count(),
                    "skipping whitespace-only chunk"
                );
                continue;
            }
            let waveform = self.invoker.invoke(chunk, reference, resources).await?;
            assembler.append(waveform)?;
        }

        lifecycle.advance(JobState::Assembling)?;
        let artifact = assembler.finish()?;
        tracing::debug!(
            request_id = %validated.request_id,
            samples = artifact.samples.len(),
            sample_rate_hz = artifact.sample_rate_hz,
            duration_seconds = artifact.duration_seconds(),
            "assembled audio artifact"
        );
        let output = self.encoder.encode(artifact)?;

        lifecycle.advance(JobState::Completed)?;
        Ok(output)
    }
}

#[async_trait]
impl SynthesizeJobUseCase for SynthesizeJobUseCaseImpl {
    async fn synthesize(&self, job: Job) -> Result<SynthesisJobOutput, ApplicationError> {
        let request_id = job.request_id.clone();
        let span = tracing::info_span!("tts_job", request_id = %request_id);

        async move {
            let started = Instant::now();
            let mut lifecycle = JobLifecycle::new();
            let mut resources = JobResources::acquire(
                request_id.as_str(),
                self.scratch_root.clone(),
                self.accelerator.clone(),
            );

            tracing::info!(request_id = %request_id, "job received");
            let result = AssertUnwindSafe(self.execute(job, &mut lifecycle, &mut resources))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    tracing::error!(
                        request_id = %request_id,
                        panic = panic_message(panic.as_ref()),
                        "job panicked"
                    );
                    Err(ApplicationError::InternalInferenceFailure(
                        "Unexpected error".to_string(),
                    ))
                });

            let reached = lifecycle.current();
            let outcome = match &result {
                Ok(_) => JobOutcome::Completed,
                Err(_) => {
                    lifecycle.fail();
                    JobOutcome::Failed
                }
            };
            resources.release(outcome).await;

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(output) => tracing::info!(
                    request_id = %request_id,
                    sample_rate = output.sample_rate,
                    elapsed_ms,
                    "job completed"
                ),
                Err(err) => tracing::error!(
                    request_id = %request_id,
                    error_type = err.kind().as_str(),
                    retryable = err.is_retryable(),
                    error = %err,
                    state = %reached,
                    elapsed_ms,
                    "job failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
