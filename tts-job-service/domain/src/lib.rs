pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod port;

pub use entity::*;
pub use error::*;
pub use lifecycle::*;
pub use port::*;
