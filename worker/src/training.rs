use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use machine_learning::{
    arch::{Mlp, loss::CrossEntropy},
    dataset::{BatchSource, DataSet},
};
use tokio::task;

use crate::{GradientExchange, Result};

/// What a worker did during training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub local_steps: u64,
    pub global_step: u64,
    pub elapsed: Duration,
    pub last_loss: Option<f32>,
}

/// The synchronous training loop of a single worker.
#[derive(Debug, Clone, Copy)]
pub struct TrainingLoop {
    worker_index: usize,
    target_step: u64,
    batch_size: usize,
}

impl TrainingLoop {
    /// Creates a new `TrainingLoop`.
    ///
    /// # Arguments
    /// * `worker_index` - The index of this worker, used for logging.
    /// * `target_step` - The global step training stops at.
    /// * `batch_size` - The amount of samples in every batch.
    ///
    /// # Returns
    /// A new `TrainingLoop` instance.
    pub fn new(worker_index: usize, target_step: u64, batch_size: usize) -> Self {
        Self {
            worker_index,
            target_step,
            batch_size,
        }
    }

    /// Trains until the global step reaches the target.
    ///
    /// Every iteration computes the gradient of one batch against the current parameters and
    /// contributes it to one synchronized step. The condition is checked before every
    /// iteration, so a session that already reached the target trains no further.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `exchange` - Where gradients are pushed and parameters come from.
    /// * `data` - The training batches.
    ///
    /// # Returns
    /// What this worker did or the first error found.
    pub async fn run<E, B>(
        &self,
        model: &mut Mlp,
        exchange: &mut E,
        data: &mut B,
    ) -> Result<TrainingReport>
    where
        E: GradientExchange,
        B: BatchSource,
    {
        let loss_fn = CrossEntropy::default();
        let mut grad = vec![0.; model.size()];

        let mut local_steps = 0;
        let mut global_step = exchange.global_step();
        let mut last_loss = None;

        info!(worker = self.worker_index, time = wall_clock(); "Training begins");
        let start = Instant::now();

        while global_step < self.target_step {
            let (x, y) = data.next_batch(self.batch_size);
            let params = exchange.params();

            let loss = task::block_in_place(|| {
                model.gradient(params, &mut grad, &loss_fn, x.view(), y.view())
            })?;

            global_step = exchange.step(&grad).await?;
            local_steps += 1;
            last_loss = Some(loss);

            let now = wall_clock();
            info!(
                time = now, worker = self.worker_index, local_step = local_steps, global_step = global_step;
                "{now:.3}: Worker {}: training step {local_steps} done (global step: {global_step})",
                self.worker_index
            );
            debug!(worker = self.worker_index, loss = loss; "batch loss");
        }

        let elapsed = start.elapsed();
        info!(worker = self.worker_index, time = wall_clock(); "Training ends");
        info!(worker = self.worker_index; "Training elapsed time: {:.3} s", elapsed.as_secs_f64());

        Ok(TrainingReport {
            local_steps,
            global_step,
            elapsed,
            last_loss,
        })
    }
}

/// Computes the mean cross entropy of `model` over a whole data set.
///
/// # Arguments
/// * `model` - The model to evaluate.
/// * `params` - The model's parameters.
/// * `data` - The samples to evaluate on.
///
/// # Returns
/// The loss per sample or an error if sizes don't match.
pub fn evaluate(model: &mut Mlp, params: &[f32], data: &DataSet) -> Result<f32> {
    let total = model.loss(params, &CrossEntropy::default(), data.images(), data.labels())?;
    Ok(total / data.len().max(1) as f32)
}

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
