use std::{error::Error, fmt, io};

use crate::JobName;

/// The cluster module's result type.
pub type Result<T> = std::result::Result<T, ClusterErr>;

/// Failures while resolving the cluster a process belongs to.
#[derive(Debug)]
pub enum ClusterErr {
    Io(io::Error),
    ZeroFanout,
    EmptyCluster,
    NoParameterServers { size: usize, fanout: usize },
    RankOutOfRange { rank: usize, size: usize },
    NoHosts,
    NotEnoughHosts { requested: usize, available: usize },
    PortOverflow { port: u16, offset: usize },
    MissingWorld,
    InvalidEnv { var: &'static str, value: String },
    InvalidAddress(String),
    MissingTask { job: JobName, index: usize },
}

impl fmt::Display for ClusterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterErr::Io(e) => write!(f, "io error: {e}"),
            ClusterErr::ZeroFanout => f.write_str("the fanout must be at least one worker per host"),
            ClusterErr::EmptyCluster => f.write_str("the cluster has no processes"),
            ClusterErr::NoParameterServers { size, fanout } => write!(
                f,
                "{size} processes with a fanout of {fanout} leave no parameter server, need at least {}",
                fanout + 1
            ),
            ClusterErr::RankOutOfRange { rank, size } => {
                write!(f, "rank {rank} is out of range for a cluster of {size} processes")
            }
            ClusterErr::NoHosts => f.write_str("the launcher reported an empty host list"),
            ClusterErr::NotEnoughHosts {
                requested,
                available,
            } => write!(
                f,
                "requested {requested} parameter server hosts but only {available} are available"
            ),
            ClusterErr::PortOverflow { port, offset } => {
                write!(f, "port {port} plus offset {offset} doesn't fit in a port number")
            }
            ClusterErr::MissingWorld => f.write_str(
                "couldn't find the process rank and size, pass them explicitly or run under an MPI launcher",
            ),
            ClusterErr::InvalidEnv { var, value } => {
                write!(f, "invalid value {value:?} for environment variable {var}")
            }
            ClusterErr::InvalidAddress(addr) => write!(f, "invalid task address {addr:?}"),
            ClusterErr::MissingTask { job, index } => {
                write!(f, "the cluster has no task {index} in job {job}")
            }
        }
    }
}

impl Error for ClusterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClusterErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClusterErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<ClusterErr> for io::Error {
    fn from(value: ClusterErr) -> Self {
        match value {
            ClusterErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
