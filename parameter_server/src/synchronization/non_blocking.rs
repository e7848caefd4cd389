use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use super::{Result, Synchronizer};
use crate::storage::{Store, StoreHandle};

/// Skips synchronization between replicas, every incoming gradient is applied immediately
/// regardless of the step it was computed at.
#[derive(Debug, Clone, Default)]
pub struct NoBlockingSync {
    global_step: Arc<AtomicU64>,
}

impl NoBlockingSync {
    /// Creates a new `NoBlockingSync` synchronizer.
    ///
    /// # Returns
    /// A new `NoBlockingSync` instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Synchronizer for NoBlockingSync {
    fn global_step(&self) -> u64 {
        self.global_step.load(Ordering::Acquire)
    }

    async fn step<S>(
        &self,
        handle: &StoreHandle<S>,
        _step: u64,
        grad: &[f32],
        params: &mut [f32],
    ) -> Result<u64>
    where
        S: Store + Sync,
    {
        handle.accumulate(grad).await?;
        handle.update_params(1).await?;
        let step = self.global_step.fetch_add(1, Ordering::AcqRel) + 1;

        handle.pull_params(params).await?;
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        initialization::ConstParamGen, optimization::GradientDescent, storage::BlockingStore,
    };

    #[tokio::test(flavor = "multi_thread")]
    async fn applies_every_gradient() {
        let shard_size = NonZeroUsize::new(4).unwrap();
        let store = BlockingStore::new(shard_size, ConstParamGen::new(0., 2), |_| {
            GradientDescent::new(1.)
        });
        let handle = StoreHandle::new(store);
        let sync = NoBlockingSync::new();
        let mut params = [0.; 2];

        sync.step(&handle, 7, &[1.; 2], &mut params).await.unwrap();
        let step = sync.step(&handle, 0, &[1.; 2], &mut params).await.unwrap();

        assert_eq!(step, 2);
        assert_eq!(params, [-2.; 2]);
    }
}
