use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::storage::SizeMismatchErr;

pub type Result<T> = std::result::Result<T, StepErr>;

/// Error returned when a replica's gradient can't take part in a training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErr {
    /// The gradient was computed against parameters of a step other than the current one.
    Stale { step: u64, global_step: u64 },
    SizeMismatch(SizeMismatchErr),
}

impl Display for StepErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepErr::Stale { step, global_step } => write!(
                f,
                "stale gradient computed at step {step}, the global step is {global_step}"
            ),
            StepErr::SizeMismatch(e) => write!(f, "{e}"),
        }
    }
}

impl Error for StepErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StepErr::SizeMismatch(e) => Some(e),
            StepErr::Stale { .. } => None,
        }
    }
}

impl From<SizeMismatchErr> for StepErr {
    fn from(value: SizeMismatchErr) -> Self {
        Self::SizeMismatch(value)
    }
}

impl From<StepErr> for io::Error {
    fn from(value: StepErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
