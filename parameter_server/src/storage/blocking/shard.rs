use parking_lot::{Mutex, RwLock};

use crate::{
    optimization::Optimizer,
    storage::{Result, SizeMismatchErr},
};

/// A buffer for accumulating gradients and parameters across multiple threads using locks.
///
/// It implements a double-buffer strategy to let replicas accumulate gradients in the active
/// buffer while the frozen one is applied and cleared by `update_params`.
#[derive(Debug)]
pub struct BlockingShard<O: Optimizer> {
    nparams: usize,
    grads: [Mutex<Box<[f32]>>; 2],
    params: RwLock<Box<[f32]>>,
    optimizer: Mutex<O>,
}

impl<O: Optimizer> BlockingShard<O> {
    /// Creates a new `BlockingShard` parameter shard.
    ///
    /// # Arguments
    /// * `params` - The initial state of the parameters.
    /// * `optimizer` - The optimization algorithm.
    ///
    /// # Returns
    /// A new `BlockingShard` instance.
    pub fn new(params: Vec<f32>, optimizer: O) -> Self {
        let nparams = params.len();

        Self {
            nparams,
            grads: [
                Mutex::new(vec![0.; nparams].into_boxed_slice()),
                Mutex::new(vec![0.; nparams].into_boxed_slice()),
            ],
            params: RwLock::new(params.into_boxed_slice()),
            optimizer: Mutex::new(optimizer),
        }
    }

    /// Accumulates `grad` into the active gradient.
    ///
    /// # Arguments
    /// * `active_idx` - The index of the active gradient, must be `0` or `1`.
    /// * `grad` - The gradient to accumulate to the active gradient.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `grad` isn't the same size as this shard.
    pub fn accumulate(&self, active_idx: usize, grad: &[f32]) -> Result<()> {
        SizeMismatchErr::check(grad.len(), self.nparams)?;

        self.grads[active_idx]
            .lock()
            .iter_mut()
            .zip(grad)
            .for_each(|(acc, g)| *acc += g);

        Ok(())
    }

    /// Scales the frozen gradient, hands it to the optimizer and clears it.
    ///
    /// # Arguments
    /// * `frozen_idx` - The index of the frozen gradient, must be `0` or `1`.
    /// * `scale` - The factor applied to the accumulated gradient.
    pub fn update_params(&self, frozen_idx: usize, scale: f32) -> Result<()> {
        let mut params = self.params.write();
        let mut grad = self.grads[frozen_idx].lock();

        if scale != 1. {
            grad.iter_mut().for_each(|g| *g *= scale);
        }

        let res = self.optimizer.lock().update_params(&grad, &mut params);
        grad.fill(0.);
        res
    }

    /// Copies the shard's inner parameters into the provided destination buffer.
    ///
    /// # Arguments
    /// * `out` - A mutable slice where the parameters will be copied.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `out` isn't the same size as this shard.
    pub fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(out.len(), self.nparams)?;
        out.copy_from_slice(&self.params.read());
        Ok(())
    }
}
