use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tempfile::TempDir;

use tts_job_application::{
    ApplicationError, ErrorKind, SynthesisJobEnvelope, SynthesisJobInput, SynthesisJobResponse,
    SynthesisSettings, SynthesizeJobUseCase, SynthesizeJobUseCaseImpl,
};
use tts_job_domain::{
    AcceleratorPort, DomainError, GenerationRequest, Job, ModelFailure, ModelInfo,
    SpeechModelPort, Waveform,
};
use tts_job_infra::AudioFileCodec;

const MODEL_RATE: u32 = 24_000;

/// Replays scripted replies in order, then synthesizes ten samples per char.
#[derive(Default)]
struct ScriptedSpeechModel {
    script: Mutex<VecDeque<Result<Waveform, ModelFailure>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    panic_on_call: bool,
}

impl ScriptedSpeechModel {
    fn with_script(replies: Vec<Result<Waveform, ModelFailure>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    fn texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .map(|request| request.text.clone())
            .collect()
    }
}

#[async_trait]
impl SpeechModelPort for ScriptedSpeechModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn describe(&self) -> Result<ModelInfo, DomainError> {
        Ok(ModelInfo {
            name: "scripted".to_string(),
            sample_rate_hz: MODEL_RATE,
        })
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Waveform, ModelFailure> {
        if self.panic_on_call {
            panic!("vocoder exploded");
        }
        let samples = request.text.chars().count() * 10;
        self.requests.lock().expect("lock").push(request);

        match self.script.lock().expect("lock").pop_front() {
            Some(reply) => reply,
            None => Ok(Waveform::new(vec![0.05; samples], MODEL_RATE)),
        }
    }
}

#[derive(Default)]
struct CountingAccelerator {
    calls: AtomicUsize,
}

impl CountingAccelerator {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcceleratorPort for CountingAccelerator {
    fn name(&self) -> &str {
        "counting"
    }

    async fn reclaim_memory(&self) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    model: Arc<ScriptedSpeechModel>,
    accelerator: Arc<CountingAccelerator>,
    scratch: TempDir,
    usecase: SynthesizeJobUseCaseImpl,
}

impl Harness {
    fn new(model: ScriptedSpeechModel) -> Self {
        let model = Arc::new(model);
        let accelerator = Arc::new(CountingAccelerator::default());
        let scratch = TempDir::new().expect("scratch root");
        let usecase = SynthesizeJobUseCaseImpl::new(
            model.clone(),
            accelerator.clone(),
            Arc::new(AudioFileCodec::new()),
            SynthesisSettings {
                scratch_root: Some(scratch.path().to_path_buf()),
                ..SynthesisSettings::default()
            },
        );

        Self {
            model,
            accelerator,
            scratch,
            usecase,
        }
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).expect("list").count()
    }
}

fn job(text: &str, reference: Option<String>) -> Job {
    Job {
        request_id: "job-under-test".to_string(),
        text: Some(text.to_string()),
        reference_audio_base64: reference,
    }
}

fn reference_wav_base64(seconds: f32) -> String {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec).expect("writer");
        for idx in 0..(seconds * 16_000.0).round() as usize {
            let value = ((idx % 64) as i16 - 32) * 256;
            writer.write_sample(value).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    STANDARD.encode(buffer.into_inner())
}

/// Silent MPEG-1 Layer III frames: 128 kbps, 44.1 kHz, mono, 1152 samples each.
fn reference_mp3_base64(frames: usize) -> String {
    const FRAME_LEN: usize = 417;
    let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
        bytes.extend_from_slice(&frame);
    }
    STANDARD.encode(bytes)
}

fn decoded_sample_count(audio_base64: &str) -> (usize, u32) {
    let bytes = STANDARD.decode(audio_base64).expect("base64");
    let reader = hound::WavReader::new(Cursor::new(bytes)).expect("wav");
    (reader.len() as usize, reader.spec().sample_rate)
}

#[tokio::test]
async fn short_text_is_one_call_at_model_rate() {
    let harness = Harness::new(ScriptedSpeechModel::default());
    let text = "Hello world, this is a short test.";

    let output = harness
        .usecase
        .synthesize(job(text, None))
        .await
        .expect("job succeeds");

    assert_eq!(harness.model.texts(), vec![text.to_string()]);
    assert_eq!(output.sample_rate, MODEL_RATE);
    assert_eq!(
        decoded_sample_count(&output.audio_base64),
        (text.chars().count() * 10, MODEL_RATE)
    );
    assert_eq!(harness.accelerator.calls(), 0);
}

#[tokio::test]
async fn long_text_is_synthesized_chunk_by_chunk_in_order() {
    let harness = Harness::new(ScriptedSpeechModel::default());
    let text = "word ".repeat(240);

    let output = harness
        .usecase
        .synthesize(job(&text, None))
        .await
        .expect("job succeeds");

    let texts = harness.model.texts();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts.concat(), text.trim());
    for chunk in &texts[..2] {
        assert!(chunk.ends_with(' '));
    }

    let expected: usize = texts.iter().map(|chunk| chunk.chars().count() * 10).sum();
    assert_eq!(decoded_sample_count(&output.audio_base64).0, expected);
}

#[tokio::test]
async fn short_reference_voice_is_rejected_before_inference() {
    let harness = Harness::new(ScriptedSpeechModel::default());

    let err = harness
        .usecase
        .synthesize(job("Hello there", Some(reference_wav_base64(3.2))))
        .await
        .expect_err("too short");

    assert_eq!(err.kind(), ErrorKind::InputValidation);
    assert_eq!(
        err.to_string(),
        "Voice sample too short: 3.2s (minimum 5.0s required)"
    );
    assert_eq!(harness.model.calls(), 0);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn reference_voice_file_exists_only_during_the_job() {
    let harness = Harness::new(ScriptedSpeechModel::default());

    harness
        .usecase
        .synthesize(job("Clone my voice", Some(reference_wav_base64(6.0))))
        .await
        .expect("job succeeds");

    let requests = harness.model.requests.lock().expect("lock");
    let prompt = requests[0]
        .audio_prompt_path
        .clone()
        .expect("reference path forwarded");
    assert!(prompt.starts_with(harness.scratch.path()));
    assert!(!Path::new(&prompt).exists());
    drop(requests);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn out_of_memory_aborts_with_one_reclamation() {
    let harness = Harness::new(ScriptedSpeechModel::with_script(vec![
        Ok(Waveform::new(vec![0.1; 100], MODEL_RATE)),
        Err(ModelFailure::OutOfMemory("CUDA out of memory".to_string())),
    ]));

    let err = harness
        .usecase
        .synthesize(job(&"word ".repeat(240), Some(reference_wav_base64(5.0))))
        .await
        .expect_err("oom");

    assert_eq!(err.kind(), ErrorKind::TransientResourceExhaustion);
    assert!(err.is_retryable());
    assert_eq!(harness.model.calls(), 2);
    assert_eq!(harness.accelerator.calls(), 1);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn precondition_failure_keeps_model_message() {
    let harness = Harness::new(ScriptedSpeechModel::with_script(vec![Err(
        ModelFailure::PreconditionViolation("Please prepare_conditionals first".to_string()),
    )]));

    let err = harness
        .usecase
        .synthesize(job("Hello", None))
        .await
        .expect_err("precondition");

    assert_eq!(
        err,
        ApplicationError::ModelPreconditionViolation(
            "Please prepare_conditionals first".to_string()
        )
    );
    assert!(!err.is_retryable());
    assert_eq!(harness.accelerator.calls(), 1);
}

#[tokio::test]
async fn internal_failures_and_rate_mismatches_are_classified() {
    let harness = Harness::new(ScriptedSpeechModel::with_script(vec![Err(
        ModelFailure::Internal("tensor shape mismatch".to_string()),
    )]));
    let err = harness
        .usecase
        .synthesize(job("Hello", None))
        .await
        .expect_err("internal");
    assert_eq!(err.kind(), ErrorKind::InternalInferenceFailure);

    let harness = Harness::new(ScriptedSpeechModel::with_script(vec![
        Ok(Waveform::new(vec![0.1; 10], MODEL_RATE)),
        Ok(Waveform::new(vec![0.1; 10], 22_050)),
    ]));
    let err = harness
        .usecase
        .synthesize(job(&"word ".repeat(150), None))
        .await
        .expect_err("rate mismatch");
    assert_eq!(err.kind(), ErrorKind::InternalInferenceFailure);
}

#[tokio::test]
async fn run_always_returns_one_structured_response() {
    let harness = Harness::new(ScriptedSpeechModel::default());

    let missing = harness
        .usecase
        .run(SynthesisJobEnvelope::new(SynthesisJobInput::default()))
        .await;
    match missing {
        SynthesisJobResponse::Failure(error) => {
            assert_eq!(error.error, "No text provided");
            assert_eq!(error.error_type, "input_validation_error");
            assert!(!error.retryable);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let invalid_id = harness
        .usecase
        .run(SynthesisJobEnvelope {
            id: Some(String::new()),
            input: SynthesisJobInput {
                text: Some("Hello".to_string()),
                ..SynthesisJobInput::default()
            },
        })
        .await;
    assert!(!invalid_id.is_success());
    assert_eq!(harness.model.calls(), 0);
}

#[tokio::test]
async fn panicking_model_becomes_internal_failure_and_cleans_up() {
    let harness = Harness::new(ScriptedSpeechModel {
        panic_on_call: true,
        ..ScriptedSpeechModel::default()
    });

    let response = harness
        .usecase
        .run(SynthesisJobEnvelope::new(SynthesisJobInput {
            text: Some("Hello".to_string()),
            reference_audio_base64: Some(reference_wav_base64(5.5)),
            ..SynthesisJobInput::default()
        }))
        .await;

    match response {
        SynthesisJobResponse::Failure(error) => {
            assert_eq!(error.error, "Audio generation failed: Unexpected error");
            assert_eq!(error.error_type, "internal_inference_failure");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.scratch_entries(), 0);
    assert_eq!(harness.accelerator.calls(), 1);
}

#[tokio::test]
async fn panic_inside_synthesize_is_classified_and_releases_the_accelerator() {
    let harness = Harness::new(ScriptedSpeechModel {
        panic_on_call: true,
        ..ScriptedSpeechModel::default()
    });

    let err = harness
        .usecase
        .synthesize(job("Hello", None))
        .await
        .expect_err("panic must surface as an error");

    assert_eq!(err.kind(), ErrorKind::InternalInferenceFailure);
    assert_eq!(harness.accelerator.calls(), 1);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn mp3_reference_voice_is_accepted() {
    let harness = Harness::new(ScriptedSpeechModel::default());

    let output = harness
        .usecase
        .synthesize(job("Clone my voice", Some(reference_mp3_base64(220))))
        .await
        .expect("job succeeds");

    assert_eq!(output.sample_rate, MODEL_RATE);
    assert_eq!(harness.model.calls(), 1);
    let requests = harness.model.requests.lock().expect("lock");
    let prompt = requests[0]
        .audio_prompt_path
        .clone()
        .expect("reference path forwarded");
    assert!(prompt.ends_with("reference.mp3"));
    drop(requests);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn whitespace_only_chunks_never_reach_the_model() {
    let harness = Harness::new(ScriptedSpeechModel::default());
    let text = format!("{}{}b", "a".repeat(499), " ".repeat(600));

    let output = harness
        .usecase
        .synthesize(job(&text, None))
        .await
        .expect("job succeeds");

    let texts = harness.model.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts.iter().all(|text| !text.trim().is_empty()));
    assert_eq!(
        decoded_sample_count(&output.audio_base64),
        ((500 + 100) * 10, MODEL_RATE)
    );
}
