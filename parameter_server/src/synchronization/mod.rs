mod barrier;
mod error;
mod non_blocking;
mod synchronizer;

pub use barrier::BarrierSync;
pub use error::{Result, StepErr};
pub use non_blocking::NoBlockingSync;
pub use synchronizer::Synchronizer;
