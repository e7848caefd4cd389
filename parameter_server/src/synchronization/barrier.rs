use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::Barrier;

use super::{Result, StepErr, Synchronizer};
use crate::storage::{Store, StoreHandle};

/// Synchronous replica aggregation.
///
/// Every replica accumulates its gradient and waits for the rest. Once all of them have
/// arrived the barrier leader applies the mean gradient and bumps the global step, then
/// every replica pulls the same fresh parameters. A missing replica stalls the step.
#[derive(Debug, Clone)]
pub struct BarrierSync {
    barrier: Arc<Barrier>,
    replicas: usize,
    global_step: Arc<AtomicU64>,
}

impl BarrierSync {
    /// Creates a new `BarrierSync` synchronizer.
    ///
    /// # Arguments
    /// * `replicas_to_aggregate` - The amount of gradients that make up one update.
    ///
    /// # Returns
    /// A new `BarrierSync` instance.
    pub fn new(replicas_to_aggregate: usize) -> Self {
        Self {
            barrier: Arc::new(Barrier::new(replicas_to_aggregate)),
            replicas: replicas_to_aggregate,
            global_step: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Synchronizer for BarrierSync {
    fn global_step(&self) -> u64 {
        self.global_step.load(Ordering::Acquire)
    }

    async fn step<S>(
        &self,
        handle: &StoreHandle<S>,
        step: u64,
        grad: &[f32],
        params: &mut [f32],
    ) -> Result<u64>
    where
        S: Store + Sync,
    {
        let global_step = self.global_step();
        if step != global_step {
            return Err(StepErr::Stale { step, global_step });
        }

        handle.accumulate(grad).await?;

        let res = if self.barrier.wait().await.is_leader() {
            let res = handle.update_params(self.replicas).await;
            self.global_step.fetch_add(1, Ordering::AcqRel);
            res
        } else {
            Ok(())
        };

        // Nobody reads until the leader is done.
        self.barrier.wait().await;
        res?;

        handle.pull_params(params).await?;
        Ok(self.global_step())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use tokio::task::JoinSet;

    use super::*;
    use crate::{
        initialization::ConstParamGen, optimization::GradientDescent, storage::BlockingStore,
    };

    fn handle(nparams: usize) -> StoreHandle<BlockingStore<GradientDescent>> {
        let shard_size = NonZeroUsize::new(2).unwrap();
        let store = BlockingStore::new(shard_size, ConstParamGen::new(1., nparams), |_| {
            GradientDescent::new(1.)
        });
        StoreHandle::new(store)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn replicas_see_one_update_with_the_mean() {
        const REPLICAS: usize = 4;
        const PARAMS: usize = 3;

        let handle = handle(PARAMS);
        let sync = BarrierSync::new(REPLICAS);
        let mut tasks = JoinSet::new();

        for i in 0..REPLICAS {
            let handle = handle.clone();
            let sync = sync.clone();

            tasks.spawn(async move {
                let grad = [i as f32; PARAMS];
                let mut params = [0.; PARAMS];
                let step = sync.step(&handle, 0, &grad, &mut params).await.unwrap();
                (step, params)
            });
        }

        // mean(0, 1, 2, 3) = 1.5, so 1 - 1.5.
        for (step, params) in tasks.join_all().await {
            assert_eq!(step, 1);
            assert_eq!(params, [-0.5; PARAMS]);
        }
        assert_eq!(sync.global_step(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_gradient_is_rejected() {
        let handle = handle(2);
        let sync = BarrierSync::new(1);
        let mut params = [0.; 2];

        sync.step(&handle, 0, &[0.; 2], &mut params).await.unwrap();
        assert_eq!(
            sync.step(&handle, 0, &[0.; 2], &mut params).await,
            Err(StepErr::Stale {
                step: 0,
                global_step: 1
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_replica_steps_every_time() {
        let handle = handle(2);
        let sync = BarrierSync::new(1);
        let mut params = [0.; 2];

        for step in 0..5 {
            let next = sync.step(&handle, step, &[0.5; 2], &mut params).await.unwrap();
            assert_eq!(next, step + 1);
        }
        assert_eq!(params, [-1.5; 2]);
    }
}
