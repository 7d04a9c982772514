use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest chunk of text handed to the model in a single call.
pub const DEFAULT_CHUNK_MAX_CHARS: usize = 500;
/// Shortest reference voice the model can clone from.
pub const MIN_VOICE_SAMPLE_SECONDS: f32 = 5.0;

/// One unit of work as received from the caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub request_id: String,
    pub text: Option<String>,
    pub reference_audio_base64: Option<String>,
}

/// Decoded reference voice, backed by a scratch file owned by the job.
#[derive(Debug, Clone)]
pub struct ReferenceVoice {
    pub path: PathBuf,
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub duration_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleEncoding {
    Int,
    Float,
}

/// Audio container contents, downmixed to mono.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate_hz as f32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// True when the chunk holds only whitespace. Such chunks keep the plan
    /// lossless but carry nothing to speak.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Model output normalized to mono samples plus the rate the model declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Final concatenated audio of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    pub chunk_sample_counts: Vec<usize>,
}

impl AudioArtifact {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate_hz as f32
    }
}

/// Sampling knobs forwarded with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub repetition_penalty: f32,
    pub temperature: f32,
    pub cfg_weight: f32,
    pub min_p: f32,
    pub exaggeration: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            repetition_penalty: 2.0,
            temperature: 0.5,
            cfg_weight: 0.8,
            min_p: 0.15,
            exaggeration: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub audio_prompt_path: Option<PathBuf>,
    pub params: GenerationParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub sample_rate_hz: u32,
}
