mod synthesize_job;

pub use synthesize_job::*;
