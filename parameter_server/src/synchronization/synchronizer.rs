use super::Result;
use crate::storage::{Store, StoreHandle};

/// Executes a single parameter update step.
///
/// A `Synchronizer` coordinates the application of gradients coming from every replica
/// and owns the global step counter.
#[allow(unused)]
#[trait_variant::make(Synchronizer: Send)]
pub trait LocalSynchronizer: Clone {
    /// Returns the amount of updates applied so far.
    fn global_step(&self) -> u64;

    /// Takes part in a training step: accumulates `grad` and, once the step is resolved,
    /// writes the resulting parameters into `params`.
    ///
    /// # Arguments
    /// * `handle` - The handle of the store holding the parameters.
    /// * `step` - The global step the gradient was computed at.
    /// * `grad` - The incoming gradient to accumulate.
    /// * `params` - Where to write the resultant parameters.
    ///
    /// # Returns
    /// The global step after the update, or an error if the gradient is stale or
    /// there's a size mismatch between `grad`, `params` and the size of the storage.
    async fn step<S>(
        &self,
        handle: &StoreHandle<S>,
        step: u64,
        grad: &[f32],
        params: &mut [f32],
    ) -> Result<u64>
    where
        S: Store + Sync;
}
