use log::{info, warn};

use crate::{ClusterSpec, Launcher, Result, Role, Topology, make_cluster};

/// Immutable per-process configuration resolved once at startup.
///
/// It carries the device ordinal the process should use instead of publishing it through a
/// process-wide environment variable.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    rank: usize,
    topology: Topology,
    visible_device: usize,
    role: Role,
    cluster: ClusterSpec,
}

impl NodeConfig {
    /// Resolves the configuration of the current process.
    ///
    /// # Arguments
    /// * `launcher` - The host discovery collaborator.
    /// * `rank` - The global rank of the process.
    /// * `size` - The total amount of processes.
    /// * `fanout` - The amount of workers per parameter server.
    /// * `devices_per_host` - The amount of accelerators on every host.
    ///
    /// # Returns
    /// A new `NodeConfig` or the first launcher or topology error found.
    pub fn resolve<L>(
        launcher: &L,
        rank: usize,
        size: usize,
        fanout: usize,
        devices_per_host: usize,
    ) -> Result<Self>
    where
        L: Launcher + ?Sized,
    {
        let topology = Topology::new(size, fanout)?;
        let role = topology.role(rank)?;

        let num_hosts = launcher.host_list()?.len();
        if num_hosts != topology.ps_count() {
            warn!(
                "the launcher reports {num_hosts} hosts but the topology has {} parameter servers",
                topology.ps_count()
            );
        }

        if let Role::ParameterServer { task_index } = role {
            let host_id = launcher.my_host_id()?;
            if host_id != task_index {
                warn!("parameter server {task_index} runs on host {host_id}");
            }
        }

        let cluster = make_cluster(launcher, fanout, topology.ps_count())?;
        let visible_device = rank % devices_per_host.max(1);

        info!(rank = rank, role:% = role, device = visible_device; "resolved node configuration");

        Ok(Self {
            rank,
            topology,
            visible_device,
            role,
            cluster,
        })
    }

    /// Returns the global rank of this process.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the shape of the cluster.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Returns the ordinal of the only device this process should see.
    pub fn visible_device(&self) -> usize {
        self.visible_device
    }

    /// Returns the role this process takes.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the cluster description.
    pub fn cluster(&self) -> &ClusterSpec {
        &self.cluster
    }

    /// Returns `true` if this process is the chief worker.
    pub fn is_chief(&self) -> bool {
        self.topology.is_chief(self.rank)
    }
}
