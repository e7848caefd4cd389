use std::{env, fs, path::Path};

use crate::{ClusterErr, Result};

/// The environment variables MPI launchers use to publish the rank and size of a process,
/// as `(rank, size)` pairs in lookup order.
const WORLD_VARS: [(&str, &str); 3] = [
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("PMIX_RANK", "PMIX_SIZE"),
];

/// Host and identity discovery, the launcher knows where every process of the run lives.
pub trait Launcher {
    /// Returns the full list of hosts taking part in the run, one entry per host.
    fn host_list(&self) -> Result<Vec<String>>;

    /// Returns the addresses of the worker tasks, `fanout` consecutive ports per host.
    ///
    /// # Arguments
    /// * `port` - The first port to use on every host.
    /// * `fanout` - The amount of workers per host.
    fn worker_host_list(&self, port: u16, fanout: usize) -> Result<Vec<String>>;

    /// Returns the addresses of the parameter server tasks, one per host.
    ///
    /// # Arguments
    /// * `port` - The port the servers listen at.
    /// * `count` - The amount of servers.
    fn ps_host_list(&self, port: u16, count: usize) -> Result<Vec<String>>;

    /// Returns the index of the host the current process runs on.
    fn my_host_id(&self) -> Result<usize>;
}

/// A launcher backed by a fixed list of hosts where ranks are placed in contiguous blocks
/// of `procs_per_host` processes per host, the way `mpirun --map-by node:PE=...` lays them.
#[derive(Debug, Clone)]
pub struct StaticLauncher {
    hosts: Vec<String>,
    rank: usize,
    procs_per_host: usize,
}

impl StaticLauncher {
    /// Creates a new `StaticLauncher`.
    ///
    /// # Arguments
    /// * `hosts` - The hosts of the run.
    /// * `rank` - The rank of the current process.
    /// * `procs_per_host` - The amount of processes launched on every host.
    ///
    /// # Returns
    /// A new `StaticLauncher` instance.
    pub fn new(hosts: Vec<String>, rank: usize, procs_per_host: usize) -> Self {
        Self {
            hosts,
            rank,
            procs_per_host: procs_per_host.max(1),
        }
    }

    /// Creates a new `StaticLauncher` reading the hosts from an MPI style hostfile.
    ///
    /// Blank lines and `#` comments are skipped, only the first token of every line is kept so
    /// `node-0 slots=5` entries are understood.
    ///
    /// # Arguments
    /// * `path` - The path of the hostfile.
    /// * `rank` - The rank of the current process.
    /// * `procs_per_host` - The amount of processes launched on every host.
    ///
    /// # Returns
    /// A new `StaticLauncher` or an io error if the file couldn't be read.
    pub fn from_hostfile<P: AsRef<Path>>(
        path: P,
        rank: usize,
        procs_per_host: usize,
    ) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let hosts = parse_hostfile(&content);
        Ok(Self::new(hosts, rank, procs_per_host))
    }
}

impl Launcher for StaticLauncher {
    fn host_list(&self) -> Result<Vec<String>> {
        if self.hosts.is_empty() {
            return Err(ClusterErr::NoHosts);
        }

        Ok(self.hosts.clone())
    }

    fn worker_host_list(&self, port: u16, fanout: usize) -> Result<Vec<String>> {
        let hosts = self.host_list()?;
        let mut addrs = Vec::with_capacity(hosts.len() * fanout);

        for host in &hosts {
            for i in 0..fanout {
                addrs.push(format!("{host}:{}", offset_port(port, i)?));
            }
        }

        Ok(addrs)
    }

    fn ps_host_list(&self, port: u16, count: usize) -> Result<Vec<String>> {
        let hosts = self.host_list()?;

        if count > hosts.len() {
            return Err(ClusterErr::NotEnoughHosts {
                requested: count,
                available: hosts.len(),
            });
        }

        Ok(hosts[..count]
            .iter()
            .map(|host| format!("{host}:{port}"))
            .collect())
    }

    fn my_host_id(&self) -> Result<usize> {
        let host_id = self.rank / self.procs_per_host;

        if host_id >= self.hosts.len() {
            return Err(ClusterErr::RankOutOfRange {
                rank: self.rank,
                size: self.hosts.len() * self.procs_per_host,
            });
        }

        Ok(host_id)
    }
}

/// Shifts `port` by `offset` checking it still is a valid port number.
fn offset_port(port: u16, offset: usize) -> Result<u16> {
    u16::try_from(port as usize + offset).map_err(|_| ClusterErr::PortOverflow { port, offset })
}

/// Keeps the first token of every meaningful line of a hostfile.
fn parse_hostfile(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Reads the rank and size of the current process as published by an MPI launcher.
///
/// # Returns
/// The `(rank, size)` pair, an error if none of the known variables are set or if they don't
/// hold numbers.
pub fn world_from_env() -> Result<(usize, usize)> {
    for (rank_var, size_var) in WORLD_VARS {
        let (Ok(rank), Ok(size)) = (env::var(rank_var), env::var(size_var)) else {
            continue;
        };

        let rank = parse_env(rank_var, rank)?;
        let size = parse_env(size_var, size)?;
        return Ok((rank, size));
    }

    Err(ClusterErr::MissingWorld)
}

fn parse_env(var: &'static str, value: String) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| ClusterErr::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(rank: usize) -> StaticLauncher {
        let hosts = vec!["node-0".to_string(), "node-1".to_string()];
        StaticLauncher::new(hosts, rank, 5)
    }

    #[test]
    fn worker_hosts_fan_out_per_host() {
        let addrs = launcher(0).worker_host_list(2222, 2).unwrap();
        assert_eq!(
            addrs,
            ["node-0:2222", "node-0:2223", "node-1:2222", "node-1:2223"]
        );
    }

    #[test]
    fn ps_hosts_take_the_first_hosts() {
        let launcher = launcher(0);

        assert_eq!(launcher.ps_host_list(2322, 1).unwrap(), ["node-0:2322"]);
        assert!(matches!(
            launcher.ps_host_list(2322, 3),
            Err(ClusterErr::NotEnoughHosts {
                requested: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn host_id_follows_rank_blocks() {
        assert_eq!(launcher(4).my_host_id().unwrap(), 0);
        assert_eq!(launcher(5).my_host_id().unwrap(), 1);
        assert!(launcher(10).my_host_id().is_err());
    }

    #[test]
    fn empty_host_list_fails() {
        let launcher = StaticLauncher::new(Vec::new(), 0, 5);
        assert!(matches!(launcher.host_list(), Err(ClusterErr::NoHosts)));
    }

    #[test]
    fn port_overflow() {
        let launcher = StaticLauncher::new(vec!["a".to_string()], 0, 5);
        assert!(matches!(
            launcher.worker_host_list(u16::MAX, 2),
            Err(ClusterErr::PortOverflow { .. })
        ));
    }

    #[test]
    fn hostfile_parsing() {
        let content = "# cluster\nnode-0 slots=5\n\n  node-1   # second\n";
        assert_eq!(parse_hostfile(content), ["node-0", "node-1"]);
    }
}
