use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The specific result type for size mismatch checks inside the storage module.
pub type Result<T> = std::result::Result<T, SizeMismatchErr>;

/// Error returned by the stores, shards and optimizers whenever there is a size mismatch
/// between gradients, parameters and external buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatchErr {
    pub got: usize,
    pub expected: usize,
}

impl SizeMismatchErr {
    pub fn check(got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(Self { got, expected });
        }

        Ok(())
    }
}

impl Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the provided buffer has {} elements but the storage expects {}",
            self.got, self.expected
        )
    }
}

impl Error for SizeMismatchErr {}

impl From<SizeMismatchErr> for io::Error {
    fn from(value: SizeMismatchErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}
