mod aggregator;
mod builder;
mod server;
mod session;

pub use aggregator::{Aggregator, ReplicaAggregator};
pub use builder::ServerBuilder;
pub use server::ParameterServer;
pub use session::ServerSession;
