use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use tts_job_domain::{AudioArtifact, AudioCodecPort, Waveform};

use crate::dto::SynthesisJobOutput;
use crate::error::ApplicationError;

/// Appends chunk waveforms in the order they were produced.
#[derive(Debug, Default)]
pub struct ResultAssembler {
    samples: Vec<f32>,
    sample_rate_hz: Option<u32>,
    chunk_sample_counts: Vec<usize>,
}

impl ResultAssembler {
    pub fn with_capacity(chunks: usize) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate_hz: None,
            chunk_sample_counts: Vec::with_capacity(chunks),
        }
    }

    pub fn chunks(&self) -> usize {
        self.chunk_sample_counts.len()
    }

    pub fn append(&mut self, waveform: Waveform) -> Result<(), ApplicationError> {
        match self.sample_rate_hz {
            Some(rate) if rate != waveform.sample_rate_hz => {
                return Err(ApplicationError::InternalInferenceFailure(format!(
                    "chunk {} sample rate {} Hz differs from {} Hz",
                    self.chunk_sample_counts.len(),
                    waveform.sample_rate_hz,
                    rate
                )));
            }
            Some(_) => {}
            None => self.sample_rate_hz = Some(waveform.sample_rate_hz),
        }

        self.chunk_sample_counts.push(waveform.samples.len());
        self.samples.extend_from_slice(&waveform.samples);
        Ok(())
    }

    pub fn finish(self) -> Result<AudioArtifact, ApplicationError> {
        let sample_rate_hz = self.sample_rate_hz.ok_or_else(|| {
            ApplicationError::InternalInferenceFailure("no audio chunks to assemble".to_string())
        })?;

        Ok(AudioArtifact {
            samples: self.samples,
            sample_rate_hz,
            chunk_sample_counts: self.chunk_sample_counts,
        })
    }
}

/// Serializes the final artifact into the transport encoding.
pub struct ArtifactEncoder {
    codec: Arc<dyn AudioCodecPort>,
    output_sample_rate_hz: Option<u32>,
}

impl ArtifactEncoder {
    pub fn new(codec: Arc<dyn AudioCodecPort>, output_sample_rate_hz: Option<u32>) -> Self {
        Self {
            codec,
            output_sample_rate_hz,
        }
    }

    pub fn encode(&self, artifact: AudioArtifact) -> Result<SynthesisJobOutput, ApplicationError> {
        let (samples, sample_rate_hz) = match self.output_sample_rate_hz {
            Some(target) if target > 0 && target != artifact.sample_rate_hz => {
                let resampled = resample_linear(&artifact.samples, artifact.sample_rate_hz, target);
                tracing::debug!(
                    source_sample_rate_hz = artifact.sample_rate_hz,
                    target_sample_rate_hz = target,
                    input_samples = artifact.samples.len(),
                    output_samples = resampled.len(),
                    "resampled artifact"
                );
                (resampled, target)
            }
            _ => (artifact.samples, artifact.sample_rate_hz),
        };

        let wav = self.codec.encode_wav(&samples, sample_rate_hz)?;

        Ok(SynthesisJobOutput {
            audio_base64: STANDARD.encode(wav),
            sample_rate: sample_rate_hz,
        })
    }
}

fn resample_linear(samples: &[f32], source_rate_hz: u32, target_rate_hz: u32) -> Vec<f32> {
    if source_rate_hz == target_rate_hz || source_rate_hz == 0 || samples.len() <= 1 {
        return samples.to_vec();
    }

    let output_len = ((samples.len() as u64 * target_rate_hz as u64) / source_rate_hz as u64)
        .max(1) as usize;
    let step = source_rate_hz as f64 / target_rate_hz as f64;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|out_idx| {
            let position = out_idx as f64 * step;
            let left = (position.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let frac = (position - left as f64).clamp(0.0, 1.0) as f32;
            samples[left] * (1.0 - frac) + samples[right] * frac
        })
        .collect()
}
