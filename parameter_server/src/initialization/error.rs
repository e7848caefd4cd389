use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type of building a server from its specification.
pub type Result<T> = std::result::Result<T, InitErr>;

/// Why a server specification couldn't be turned into an aggregator.
#[derive(Debug)]
pub enum InitErr {
    /// A distribution was given parameters it can't be built from.
    Distribution(String),
    /// A barrier that waits for no replicas would never apply a meaningful mean.
    NoReplicas,
}

impl From<NormalError> for InitErr {
    fn from(value: NormalError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl From<UniformError> for InitErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl Display for InitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitErr::Distribution(e) => write!(f, "invalid parameter distribution: {e}"),
            InitErr::NoReplicas => f.write_str("a barrier needs at least one replica to aggregate"),
        }
    }
}

impl Error for InitErr {}

impl From<InitErr> for io::Error {
    fn from(value: InitErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}
