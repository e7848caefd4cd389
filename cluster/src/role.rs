use std::fmt;

use serde::{Deserialize, Serialize};

/// The name of a group of tasks inside the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    Ps,
    Worker,
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobName::Ps => f.write_str("ps"),
            JobName::Worker => f.write_str("worker"),
        }
    }
}

/// The role a process takes for the entire training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ParameterServer { task_index: usize },
    Worker { task_index: usize },
}

impl Role {
    /// Derives the role of a process from its rank.
    ///
    /// Ranks are laid out in windows of `fanout + 1` processes, the last rank of each window is
    /// that window's parameter server. A worker's task index skips the servers that precede it,
    /// so worker indices are dense across the whole cluster.
    ///
    /// # Arguments
    /// * `rank` - The global rank of the process.
    /// * `fanout` - The amount of workers per parameter server.
    ///
    /// # Returns
    /// The role of the process.
    pub fn from_rank(rank: usize, fanout: usize) -> Self {
        let window = fanout + 1;
        let ps_index = rank / window;

        if (rank + 1) % window == 0 {
            Self::ParameterServer {
                task_index: ps_index,
            }
        } else {
            Self::Worker {
                task_index: rank - ps_index,
            }
        }
    }

    /// Returns the job this role belongs to.
    pub fn job(&self) -> JobName {
        match self {
            Role::ParameterServer { .. } => JobName::Ps,
            Role::Worker { .. } => JobName::Worker,
        }
    }

    /// Returns the index of the task inside its job.
    pub fn task_index(&self) -> usize {
        match *self {
            Role::ParameterServer { task_index } | Role::Worker { task_index } => task_index,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/job:{}/task:{}", self.job(), self.task_index())
    }
}
