pub mod assembly;
pub mod chunking;
pub mod dto;
pub mod error;
pub mod inference;
pub mod resource;
pub mod usecase;
pub mod validation;

pub use assembly::{ArtifactEncoder, ResultAssembler};
pub use chunking::ChunkPlanner;
pub use dto::*;
pub use error::*;
pub use inference::{InferenceInvoker, InferenceResult};
pub use resource::{JobOutcome, JobResources, ReleaseReport};
pub use usecase::{
    SynthesisSettings, DEFAULT_MAX_TEXT_CHARS, SynthesizeJobUseCase, SynthesizeJobUseCaseImpl,
};
pub use validation::{InputValidator, ValidatedJob};
