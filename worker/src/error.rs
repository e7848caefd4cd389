use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Ml(MlErr),
    NoParameterServers,
    ServerCountMismatch {
        got: usize,
        expected: usize,
    },
    UnexpectedMessage {
        server: usize,
        got: &'static str,
    },
    ParamsLengthMismatch {
        server: usize,
        got: usize,
        expected: usize,
    },
    Server {
        server: usize,
        detail: String,
    },
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Ml(e) => write!(f, "model error: {e}"),
            WorkerErr::NoParameterServers => write!(f, "the cluster has no parameter servers"),
            WorkerErr::ServerCountMismatch { got, expected } => write!(
                f,
                "connected to {got} parameter servers, the placement expects {expected}"
            ),
            WorkerErr::UnexpectedMessage { server, got } => {
                write!(f, "unexpected message from ps {server}: got {got}")
            }
            WorkerErr::ParamsLengthMismatch {
                server,
                got,
                expected,
            } => write!(
                f,
                "params length mismatch from ps {server}: got {got}, expected {expected}"
            ),
            WorkerErr::Server { server, detail } => write!(f, "ps {server} failed: {detail}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
