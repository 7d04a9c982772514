pub mod health;
pub mod job;

pub use health::health_check;
pub use job::run_job;
