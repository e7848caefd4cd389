use std::{num::NonZeroUsize, path::PathBuf};

use comms::specs::server::OptimizerSpec;

use crate::SessionConfig;

/// Everything a worker needs to take part in a training run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// The index of this worker among the `worker` tasks.
    pub worker_index: usize,
    /// Whether this worker initializes the session.
    pub is_chief: bool,
    /// The amount of workers whose gradients make up one step.
    pub worker_count: usize,
    /// The address of every `ps` task, in task order.
    pub ps_addrs: Vec<String>,
    /// The ordinal of the only device this worker should use.
    pub visible_device: usize,
    pub data_dir: PathBuf,
    pub hidden_units: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// The global step training stops at.
    pub train_steps: u64,
    pub shard_size: NonZeroUsize,
    /// Seeds the data shuffling and the parameter initialization, random when missing.
    pub seed: Option<u64>,
    /// Whether to evaluate the validation split once training ends.
    pub validate: bool,
}

impl WorkerConfig {
    /// Returns how the chief initializes the parameter servers.
    ///
    /// Servers run Adam and apply one update per `worker_count` gradients.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            shard_size: self.shard_size,
            optimizer: OptimizerSpec::adam(self.learning_rate),
            replicas_to_aggregate: self.worker_count,
            seed: self.seed,
        }
    }
}
