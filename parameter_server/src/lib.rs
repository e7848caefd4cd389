//! The parameter server side of synchronous replica training.
//!
//! A server holds a slice of the model's variables in a sharded store, aggregates the
//! gradients pushed by every worker and answers each of them with the updated parameters.

pub mod initialization;
pub mod optimization;
pub mod service;
pub mod storage;
pub mod synchronization;

pub use service::{Aggregator, ParameterServer, ServerBuilder, ServerSession};
