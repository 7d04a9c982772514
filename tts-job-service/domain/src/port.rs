use async_trait::async_trait;

use crate::{DecodedAudio, DomainError, GenerationRequest, ModelFailure, ModelInfo, Waveform};

/// Pretrained text-to-speech model, loaded once and shared across jobs.
#[async_trait]
pub trait SpeechModelPort: Send + Sync {
    fn name(&self) -> &str;

    async fn describe(&self) -> Result<ModelInfo, DomainError>;

    async fn generate(&self, request: GenerationRequest) -> Result<Waveform, ModelFailure>;
}

/// Device runtime the model executes on.
#[async_trait]
pub trait AcceleratorPort: Send + Sync {
    fn name(&self) -> &str;

    /// Best-effort release of cached device memory.
    async fn reclaim_memory(&self) -> Result<(), DomainError>;
}

pub trait AudioCodecPort: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DomainError>;

    fn encode_wav(&self, samples: &[f32], sample_rate_hz: u32) -> Result<Vec<u8>, DomainError>;
}
