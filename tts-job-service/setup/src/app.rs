use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, Error};

use tts_job_application::{
    ApplicationError, InputValidationError, SynthesisJobEnvelope, SynthesisJobResponse,
    SynthesisSettings, SynthesizeJobUseCase, SynthesizeJobUseCaseImpl,
};
use tts_job_configuration::{
    AcceleratorConfig, AcceleratorKind, AppConfig, JobConfig, ModelConfig,
};
use tts_job_domain::{AcceleratorPort, DomainError, GenerationParams, ModelInfo, SpeechModelPort};
use tts_job_http_server::{create_router, serve, AppState};
use tts_job_infra::{NoopAccelerator, RemoteAccelerator, RestSpeechModel, AudioFileCodec};

pub async fn build_and_run(config: AppConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run().await
}

pub struct Application {
    pub config: AppConfig,
    pub model_info: ModelInfo,
    pub usecase: Arc<dyn SynthesizeJobUseCase>,
}

impl Application {
    /// Connects to the model runtime and waits until it reports ready.
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        let model_config = &config.service.model;
        let model = Arc::new(
            RestSpeechModel::new(
                &model_config.endpoint,
                Duration::from_millis(model_config.connect_timeout_ms.max(1)),
                Duration::from_millis(model_config.request_timeout_ms.max(1)),
            )
            .map_err(|err| anyhow!("failed to build model client: {err}"))?,
        );
        let accelerator = build_accelerator(&config.service.accelerator, model_config)?;

        Self::with_adapters(config, model, accelerator).await
    }

    pub async fn with_adapters(
        config: AppConfig,
        model: Arc<dyn SpeechModelPort>,
        accelerator: Arc<dyn AcceleratorPort>,
    ) -> Result<Self, Error> {
        let model_config = &config.service.model;
        let model_info = connect_with_retry(
            model.name(),
            model_config.startup_retries.max(1),
            Duration::from_millis(model_config.startup_retry_delay_ms),
            || model.describe(),
        )
        .await?;

        tracing::info!(
            model = %model_info.name,
            sample_rate_hz = model_info.sample_rate_hz,
            accelerator = accelerator.name(),
            chunk_max_chars = config.service.job.chunk_max_chars,
            "model runtime ready"
        );

        let usecase: Arc<dyn SynthesizeJobUseCase> = Arc::new(SynthesizeJobUseCaseImpl::new(
            model,
            accelerator,
            Arc::new(AudioFileCodec::new()),
            synthesis_settings(&config.service.job, model_config),
        ));

        Ok(Self {
            config,
            model_info,
            usecase,
        })
    }

    pub async fn run(self) -> Result<(), Error> {
        let router = create_router(AppState::new(self.usecase.clone()), &self.config.server);
        serve(router, &self.config.server)
            .await
            .map_err(|err| anyhow!("tts job http server failed: {err}"))
    }

    /// Processes one raw JSON envelope. Always yields exactly one response.
    pub async fn run_single_job(&self, raw: &str) -> SynthesisJobResponse {
        match serde_json::from_str::<SynthesisJobEnvelope>(raw) {
            Ok(envelope) => self.usecase.run(envelope).await,
            Err(err) => {
                tracing::warn!(error = %err, "job input is not a valid envelope");
                let error =
                    ApplicationError::from(InputValidationError::InvalidRequest(err.to_string()));
                SynthesisJobResponse::Failure(error.to_output())
            }
        }
    }
}

fn build_accelerator(
    config: &AcceleratorConfig,
    model: &ModelConfig,
) -> Result<Arc<dyn AcceleratorPort>, Error> {
    match config.kind {
        AcceleratorKind::None => Ok(Arc::new(NoopAccelerator)),
        AcceleratorKind::Remote => {
            let endpoint = config.endpoint.as_deref().unwrap_or(&model.endpoint);
            let accelerator = RemoteAccelerator::new(
                endpoint,
                &config.reclaim_path,
                Duration::from_millis(config.timeout_ms.max(1)),
            )
            .map_err(|err| anyhow!("failed to build accelerator client: {err}"))?;
            Ok(Arc::new(accelerator))
        }
    }
}

fn synthesis_settings(job: &JobConfig, model: &ModelConfig) -> SynthesisSettings {
    let generation = &model.generation;
    SynthesisSettings {
        chunk_max_chars: job.chunk_max_chars,
        min_voice_seconds: job.min_voice_seconds,
        max_text_chars: job.max_text_chars,
        scratch_root: job.scratch_dir.clone(),
        output_sample_rate_hz: job.output_sample_rate_hz,
        generation: GenerationParams {
            repetition_penalty: generation.repetition_penalty,
            temperature: generation.temperature,
            cfg_weight: generation.cfg_weight,
            min_p: generation.min_p,
            exaggeration: generation.exaggeration,
        },
    }
}

async fn connect_with_retry<C, F, Fut>(
    service: &str,
    attempts: u32,
    delay: Duration,
    mut connect_fn: F,
) -> Result<C, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<C, DomainError>>,
{
    let mut last_error = None;
    for attempt in 1..=attempts {
        match connect_fn().await {
            Ok(client) => return Ok(client),
            Err(err) => {
                tracing::warn!(service, attempt, attempts, error = %err, "service not ready");
                last_error = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(anyhow!(
        "failed to reach {service} after {attempts} attempts: {}",
        last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown connection error".to_string())
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tts_job_domain::{GenerationRequest, ModelFailure, Waveform};

    use super::*;

    struct SilentModel;

    #[async_trait]
    impl SpeechModelPort for SilentModel {
        fn name(&self) -> &str {
            "silent"
        }

        async fn describe(&self) -> Result<ModelInfo, DomainError> {
            Ok(ModelInfo {
                name: "silent".to_string(),
                sample_rate_hz: 24_000,
            })
        }

        async fn generate(&self, request: GenerationRequest) -> Result<Waveform, ModelFailure> {
            Ok(Waveform::new(vec![0.0; request.text.len()], 24_000))
        }
    }

    async fn application() -> Application {
        Application::with_adapters(
            AppConfig::default(),
            Arc::new(SilentModel),
            Arc::new(NoopAccelerator),
        )
        .await
        .expect("application builds")
    }

    #[test]
    fn settings_follow_configuration() {
        let mut config = AppConfig::default();
        config.service.job.chunk_max_chars = 320;
        config.service.job.output_sample_rate_hz = Some(16_000);
        config.service.model.generation.temperature = 0.9;

        let settings = synthesis_settings(&config.service.job, &config.service.model);

        assert_eq!(settings.chunk_max_chars, 320);
        assert_eq!(settings.output_sample_rate_hz, Some(16_000));
        assert_eq!(settings.generation.temperature, 0.9);
        assert_eq!(settings.generation.cfg_weight, 0.8);
    }

    #[test]
    fn remote_accelerator_defaults_to_model_endpoint() {
        let mut config = AppConfig::default();
        config.service.accelerator.kind = AcceleratorKind::Remote;

        let accelerator =
            build_accelerator(&config.service.accelerator, &config.service.model).expect("built");
        assert_eq!(accelerator.name(), "remote");
    }

    #[tokio::test]
    async fn retry_gives_up_after_configured_attempts() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), Error> =
            connect_with_retry("tts-model", 3, Duration::from_millis(1), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(DomainError::external_service_error("tts-model", "refused")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_job_returns_success_json() {
        let app = application().await;
        assert_eq!(app.model_info.sample_rate_hz, 24_000);

        let response = app
            .run_single_job(r#"{"input": {"text": "Hello world"}}"#)
            .await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn malformed_single_job_is_a_structured_failure() {
        let app = application().await;

        match app.run_single_job("{ nope").await {
            SynthesisJobResponse::Failure(error) => {
                assert_eq!(error.error_type, "input_validation_error");
                assert!(error.error.starts_with("Invalid request"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
