use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use cluster::{JobName, NodeConfig, StaticLauncher};
use worker::WorkerConfig;

/// One process of a synchronous parameter server training run on MNIST.
///
/// Every process of the run gets the same flags, its rank alone decides whether it serves
/// parameters or trains.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Args {
    /// Directory holding the MNIST IDX files, gzipped or not.
    #[arg(long, env, default_value = "./mnist-data")]
    pub data_dir: PathBuf,

    /// Only prepare the dataset and exit.
    #[arg(long, env)]
    pub download_only: bool,

    /// Width of the hidden layer.
    #[arg(long, env, default_value_t = 100)]
    pub hidden_units: usize,

    /// Samples per training batch.
    #[arg(long, env, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, env, default_value_t = 0.01)]
    pub learning_rate: f32,

    /// Global rank of this process, read from the MPI environment when missing.
    #[arg(long, env)]
    pub rank: Option<usize>,

    /// Total amount of processes, read from the MPI environment when missing.
    #[arg(long, env)]
    pub size: Option<usize>,

    /// Comma separated hosts of the run, in rank order.
    #[arg(long, env, value_delimiter = ',', default_value = "localhost")]
    pub hosts: Vec<String>,

    /// MPI style hostfile, takes precedence over `--hosts`.
    #[arg(long, env)]
    pub hostfile: Option<PathBuf>,

    /// Workers per host, every host also runs one parameter server.
    #[arg(long, env, default_value_t = 4)]
    pub fanout: usize,

    #[arg(long, env, default_value_t = 4)]
    pub devices_per_host: usize,

    /// Global step training stops at.
    #[arg(long, env, default_value_t = 1000)]
    pub train_steps: u64,

    /// Parameters per storage shard on the parameter servers.
    #[arg(long, env, default_value = "4096")]
    pub shard_size: NonZeroUsize,

    /// Seeds data shuffling and parameter initialization.
    #[arg(long, env)]
    pub seed: Option<u64>,

    /// Report the validation loss once training ends.
    #[arg(long, env)]
    pub validate: bool,
}

impl Args {
    /// Returns the rank and size of this process, filling the missing ones from the MPI
    /// environment.
    pub fn world(&self) -> cluster::Result<(usize, usize)> {
        match (self.rank, self.size) {
            (Some(rank), Some(size)) => Ok((rank, size)),
            (rank, size) => {
                let (env_rank, env_size) = cluster::world_from_env()?;
                Ok((rank.unwrap_or(env_rank), size.unwrap_or(env_size)))
            }
        }
    }

    /// Builds the launcher of this process.
    ///
    /// # Arguments
    /// * `rank` - The global rank of this process.
    pub fn launcher(&self, rank: usize) -> cluster::Result<StaticLauncher> {
        let procs_per_host = self.fanout + 1;

        match &self.hostfile {
            Some(path) => StaticLauncher::from_hostfile(path, rank, procs_per_host),
            None => Ok(StaticLauncher::new(self.hosts.clone(), rank, procs_per_host)),
        }
    }

    /// Builds the configuration of a worker process.
    ///
    /// # Arguments
    /// * `node` - The resolved configuration of this process.
    /// * `worker_index` - The index of this worker among the `worker` tasks.
    pub fn worker_config(&self, node: &NodeConfig, worker_index: usize) -> WorkerConfig {
        WorkerConfig {
            worker_index,
            is_chief: node.is_chief(),
            worker_count: node.topology().worker_count(),
            ps_addrs: node.cluster().tasks(JobName::Ps).to_vec(),
            visible_device: node.visible_device(),
            data_dir: self.data_dir.clone(),
            hidden_units: self.hidden_units,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            train_steps: self.train_steps,
            shard_size: self.shard_size,
            seed: self.seed,
            validate: self.validate,
        }
    }
}

#[cfg(test)]
mod tests {
    use cluster::Role;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(["node"].iter().chain(args)).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);

        assert_eq!(args.hidden_units, 100);
        assert_eq!(args.batch_size, 100);
        assert_eq!(args.fanout, 4);
        assert_eq!(args.train_steps, 1000);
        assert_eq!(args.shard_size.get(), 4096);
        assert!(!args.download_only);
        assert!(!args.validate);
    }

    #[test]
    fn explicit_world_skips_the_environment() {
        let args = parse(&["--rank", "3", "--size", "10"]);
        assert_eq!(args.world().unwrap(), (3, 10));
    }

    #[test]
    fn hosts_are_comma_separated() {
        let args = parse(&["--hosts", "node-0,node-1"]);
        assert_eq!(args.hosts, ["node-0", "node-1"]);
    }

    #[test]
    fn worker_config_from_the_cluster() {
        let args = parse(&["--hosts", "node-0,node-1", "--learning-rate", "0.5"]);
        let launcher = args.launcher(6).unwrap();
        let node = NodeConfig::resolve(&launcher, 6, 10, args.fanout, args.devices_per_host)
            .unwrap();

        let Role::Worker { task_index } = node.role() else {
            panic!("rank 6 is a worker");
        };
        let config = args.worker_config(&node, task_index);

        assert_eq!(config.worker_index, 5);
        assert!(!config.is_chief);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.ps_addrs, ["node-0:2322", "node-1:2322"]);
        assert_eq!(config.visible_device, 2);
        assert_eq!(config.learning_rate, 0.5);
    }
}
