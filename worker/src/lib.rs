//! A training replica of a synchronous parameter server cluster.
//!
//! Every worker holds a connection to each parameter server, the chief brings the session
//! up and the rest wait for it. From then on each step every worker pushes the gradient of
//! one batch and gets back the parameters of the next global step.

mod client;
mod config;
mod error;
mod exchange;
mod placement;
mod session;
pub mod training;
mod worker;

pub use client::PsClient;
pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
pub use exchange::{GradientExchange, LocalGradientExchange};
pub use placement::VariablePlacement;
pub use session::{Session, SessionConfig};
pub use training::{TrainingLoop, TrainingReport};
pub use worker::Worker;
