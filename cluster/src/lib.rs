//! Everything a process needs to know about its place in the training cluster.
//!
//! Ranks are handed out by an external launcher, from there every process derives the same
//! topology: one parameter server per host followed by `fanout` workers, the named cluster
//! description with the address of every task and the role it should take.

mod config;
mod error;
mod launcher;
mod role;
mod spec;
mod topology;

pub use config::NodeConfig;
pub use error::{ClusterErr, Result};
pub use launcher::{Launcher, StaticLauncher, world_from_env};
pub use role::{JobName, Role};
pub use spec::{ClusterSpec, PS_PORT, WORKER_PORT, make_cluster};
pub use topology::Topology;
