use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use tts_job_domain::{AudioCodecPort, DecodedAudio, Job, ReferenceVoice, SampleEncoding};

use crate::error::{ApplicationError, InputValidationError};
use crate::resource::JobResources;


/// Text and optional reference voice that passed every pre-flight check.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub request_id: String,
    pub text: String,
    pub reference_voice: Option<ReferenceVoice>,
}

pub struct InputValidator {
    codec: Arc<dyn AudioCodecPort>,
    min_voice_seconds: f32,
    max_text_chars: usize,
}

impl InputValidator {
    pub fn new(
        codec: Arc<dyn AudioCodecPort>,
        min_voice_seconds: f32,
        max_text_chars: usize,
    ) -> Self {
        Self {
            codec,
            min_voice_seconds,
            max_text_chars,
        }
    }

    /// Checks the job before anything touches the accelerator.
    ///
    /// A reference voice is written into the job's scratch directory, since the
    /// model only accepts a file path.
    pub fn validate(
        &self,
        job: Job,
        resources: &mut JobResources,
    ) -> Result<ValidatedJob, ApplicationError> {
        let text = self.validate_text(job.text.as_deref())?;

        let reference_voice = match job.reference_audio_base64.as_deref() {
            Some(encoded) => Some(self.validate_reference(encoded, resources)?),
            None => None,
        };

        tracing::info!(
            request_id = %job.request_id,
            text_chars = text.chars().count(),
            has_reference = reference_voice.is_some(),
            "job input validated"
        );

        Ok(ValidatedJob {
            request_id: job.request_id,
            text,
            reference_voice,
        })
    }

    fn validate_text(&self, text: Option<&str>) -> Result<String, InputValidationError> {
        let text = text.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(InputValidationError::MissingText);
        }

        let length = text.chars().count();
        if length > self.max_text_chars {
            return Err(InputValidationError::TextTooLong {
                length,
                maximum: self.max_text_chars,
            });
        }

        Ok(text.to_string())
    }

    fn validate_reference(
        &self,
        encoded: &str,
        resources: &mut JobResources,
    ) -> Result<ReferenceVoice, ApplicationError> {
        let compact: String = encoded.chars().filter(|ch| !ch.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(InputValidationError::EmptyVoiceSample.into());
        }

        let bytes = STANDARD.decode(compact.as_bytes()).map_err(|err| {
            InputValidationError::InvalidEncoding(format!("Invalid base64 encoding: {err}"))
        })?;
        if bytes.is_empty() {
            return Err(InputValidationError::EmptyVoiceSample.into());
        }

        let path = resources.write_scratch_file(reference_file_name(&bytes), &bytes)?;

        let decoded = self
            .codec
            .decode(&bytes)
            .map_err(|err| InputValidationError::UndecodableAudio(err.to_string()))?;
        if decoded.samples.is_empty() {
            return Err(InputValidationError::EmptyVoiceSample.into());
        }

        let duration_seconds = decoded.duration_seconds();
        if duration_seconds < self.min_voice_seconds {
            return Err(InputValidationError::VoiceSampleTooShort {
                duration_seconds,
                minimum_seconds: self.min_voice_seconds,
            }
            .into());
        }

        check_layout(&decoded)?;

        tracing::debug!(
            request_id = %resources.request_id(),
            duration_seconds,
            sample_rate_hz = decoded.sample_rate_hz,
            channels = decoded.channels,
            "reference voice accepted"
        );

        Ok(ReferenceVoice {
            path,
            samples: decoded.samples,
            sample_rate_hz: decoded.sample_rate_hz,
            duration_seconds,
        })
    }
}

fn check_layout(audio: &DecodedAudio) -> Result<(), InputValidationError> {
    if !(1..=2).contains(&audio.channels) {
        return Err(InputValidationError::UnsupportedFormat(format!(
            "{} channels (mono or stereo required)",
            audio.channels
        )));
    }

    let supported = match audio.encoding {
        SampleEncoding::Int => matches!(audio.bits_per_sample, 8 | 16 | 24 | 32),
        SampleEncoding::Float => audio.bits_per_sample == 32,
    };
    if !supported {
        return Err(InputValidationError::UnsupportedFormat(format!(
            "{}-bit {:?} samples",
            audio.bits_per_sample, audio.encoding
        )));
    }

    if audio.sample_rate_hz == 0 {
        return Err(InputValidationError::UnsupportedFormat(
            "zero sample rate".to_string(),
        ));
    }

    Ok(())
}

/// Keeps the container's usual extension so the model runtime can sniff it.
fn reference_file_name(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"RIFF") {
        "reference.wav"
    } else {
        "reference.mp3"
    }
}
