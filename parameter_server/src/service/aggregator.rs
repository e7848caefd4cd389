use async_trait::async_trait;

use crate::{
    storage::{self, Store, StoreHandle},
    synchronization::{self, Synchronizer},
};

/// This trait acts as an indirection layer, allowing the `ServerBuilder` to return
/// differently configured stores and synchronizers from its unique build method.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Returns the amount of parameters this server holds.
    fn len(&self) -> usize;

    /// Returns `true` if this server holds no parameters.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the amount of updates applied so far.
    fn global_step(&self) -> u64;

    /// Copies the current parameters into `out`.
    async fn pull_params(&self, out: &mut [f32]) -> storage::Result<()>;

    /// Indirection method for `Synchronizer::step`.
    async fn step(&self, step: u64, grad: &[f32], out: &mut [f32]) -> synchronization::Result<u64>;
}

/// Aggregates the gradients of every replica into a store following a synchronization policy.
pub struct ReplicaAggregator<S: Store, Sy: Synchronizer> {
    handle: StoreHandle<S>,
    synchronizer: Sy,
}

impl<S: Store, Sy: Synchronizer> ReplicaAggregator<S, Sy> {
    /// Creates a new `ReplicaAggregator`.
    ///
    /// # Arguments
    /// * `handle` - The handle of the store holding the parameters.
    /// * `synchronizer` - The synchronization policy between replicas.
    ///
    /// # Returns
    /// A new `ReplicaAggregator` instance.
    pub fn new(handle: StoreHandle<S>, synchronizer: Sy) -> Self {
        Self {
            handle,
            synchronizer,
        }
    }
}

#[async_trait]
impl<S, Sy> Aggregator for ReplicaAggregator<S, Sy>
where
    S: Store + Send + Sync,
    Sy: Synchronizer + Sync,
{
    fn len(&self) -> usize {
        self.handle.len()
    }

    fn global_step(&self) -> u64 {
        self.synchronizer.global_step()
    }

    async fn pull_params(&self, out: &mut [f32]) -> storage::Result<()> {
        self.handle.pull_params(out).await
    }

    async fn step(&self, step: u64, grad: &[f32], out: &mut [f32]) -> synchronization::Result<u64> {
        self.synchronizer.step(&self.handle, step, grad, out).await
    }
}
