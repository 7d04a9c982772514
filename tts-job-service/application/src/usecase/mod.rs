mod synthesize_job;

pub use synthesize_job::{
    SynthesisSettings, DEFAULT_MAX_TEXT_CHARS, SynthesizeJobUseCase, SynthesizeJobUseCaseImpl,
};
