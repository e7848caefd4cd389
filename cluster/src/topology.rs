use crate::{ClusterErr, Result, Role};

/// The shape of the cluster as derived from the amount of processes and the fanout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    size: usize,
    fanout: usize,
}

impl Topology {
    /// Creates a new `Topology`.
    ///
    /// # Arguments
    /// * `size` - The total amount of processes.
    /// * `fanout` - The amount of workers per parameter server.
    ///
    /// # Returns
    /// A new `Topology` or an error if it would be left without workers or servers.
    pub fn new(size: usize, fanout: usize) -> Result<Self> {
        if fanout == 0 {
            return Err(ClusterErr::ZeroFanout);
        }

        if size == 0 {
            return Err(ClusterErr::EmptyCluster);
        }

        let topology = Self { size, fanout };

        if topology.ps_count() == 0 {
            return Err(ClusterErr::NoParameterServers { size, fanout });
        }

        Ok(topology)
    }

    /// Returns the total amount of processes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of workers per parameter server.
    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Returns the amount of parameter servers, one per full window of `fanout + 1` ranks.
    pub fn ps_count(&self) -> usize {
        self.size / (self.fanout + 1)
    }

    /// Returns the amount of workers, this is also the amount of replicas to aggregate.
    pub fn worker_count(&self) -> usize {
        self.size - self.ps_count()
    }

    /// Resolves the role of a rank inside this topology.
    ///
    /// # Arguments
    /// * `rank` - The global rank of the process.
    ///
    /// # Returns
    /// The role of the process or an error if the rank is out of range.
    pub fn role(&self, rank: usize) -> Result<Role> {
        if rank >= self.size {
            return Err(ClusterErr::RankOutOfRange {
                rank,
                size: self.size,
            });
        }

        Ok(Role::from_rank(rank, self.fanout))
    }

    /// Iterates over the role of every rank in order.
    pub fn roles(&self) -> impl Iterator<Item = (usize, Role)> + use<> {
        let fanout = self.fanout;
        (0..self.size).map(move |rank| (rank, Role::from_rank(rank, fanout)))
    }

    /// Returns `true` if `rank` is the chief worker, the one in charge of initialization.
    pub fn is_chief(&self, rank: usize) -> bool {
        rank == 0
    }
}
