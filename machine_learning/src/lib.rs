pub mod arch;
pub mod dataset;
pub mod error;

pub use error::{MlErr, Result};
