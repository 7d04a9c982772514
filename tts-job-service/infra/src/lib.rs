pub mod accelerator;
pub mod codec;
pub mod model_rest;

pub use accelerator::{NoopAccelerator, RemoteAccelerator};
pub use codec::AudioFileCodec;
pub use model_rest::RestSpeechModel;
