use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{ClusterErr, JobName, Launcher, Result};

/// The first port of the worker tasks on every host.
pub const WORKER_PORT: u16 = 2222;

/// The port of the parameter server task on every host.
pub const PS_PORT: u16 = 2322;

/// The named description of the cluster: the address of every task of every job.
///
/// Every process builds its own copy deterministically from its launcher, nothing here is
/// exchanged between processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    ps: Vec<String>,
    worker: Vec<String>,
}

impl ClusterSpec {
    /// Creates a new `ClusterSpec`.
    ///
    /// # Arguments
    /// * `ps` - The addresses of the parameter server tasks, in task order.
    /// * `worker` - The addresses of the worker tasks, in task order.
    ///
    /// # Returns
    /// A new `ClusterSpec` instance.
    pub fn new(ps: Vec<String>, worker: Vec<String>) -> Self {
        Self { ps, worker }
    }

    /// Returns the addresses of every task of `job`.
    pub fn tasks(&self, job: JobName) -> &[String] {
        match job {
            JobName::Ps => &self.ps,
            JobName::Worker => &self.worker,
        }
    }

    /// Returns the amount of tasks in `job`.
    pub fn num_tasks(&self, job: JobName) -> usize {
        self.tasks(job).len()
    }

    /// Returns the address of a single task.
    ///
    /// # Arguments
    /// * `job` - The job of the task.
    /// * `index` - The index of the task inside its job.
    ///
    /// # Returns
    /// The task's address or an error if there is no such task.
    pub fn task_address(&self, job: JobName, index: usize) -> Result<&str> {
        self.tasks(job)
            .get(index)
            .map(String::as_str)
            .ok_or(ClusterErr::MissingTask { job, index })
    }

    /// Returns the port a task should listen at, taken from its address.
    ///
    /// # Arguments
    /// * `job` - The job of the task.
    /// * `index` - The index of the task inside its job.
    ///
    /// # Returns
    /// The port or an error if the task is missing or its address has no valid port.
    pub fn task_port(&self, job: JobName, index: usize) -> Result<u16> {
        let addr = self.task_address(job, index)?;

        addr.rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .ok_or_else(|| ClusterErr::InvalidAddress(addr.to_string()))
    }
}

impl fmt::Display for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ps: {:?}, worker: {:?}}}", self.ps, self.worker)
    }
}

/// Asks the launcher for the address of every task and builds the cluster description.
///
/// # Arguments
/// * `launcher` - The host discovery collaborator.
/// * `fanout` - The amount of workers per host.
/// * `ps_count` - The amount of parameter servers.
///
/// # Returns
/// The cluster description, any launcher failure is returned as is.
pub fn make_cluster<L>(launcher: &L, fanout: usize, ps_count: usize) -> Result<ClusterSpec>
where
    L: Launcher + ?Sized,
{
    let worker_hosts = launcher.worker_host_list(WORKER_PORT, fanout)?;
    info!("worker_hosts {worker_hosts:?}");

    let ps_hosts = launcher.ps_host_list(PS_PORT, ps_count)?;
    info!("ps_hosts {ps_hosts:?}");

    Ok(ClusterSpec::new(ps_hosts, worker_hosts))
}
