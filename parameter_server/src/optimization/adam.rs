use super::Optimizer;
use crate::storage::{Result, SizeMismatchErr};

/// Adam, applied once per global step to the mean gradient of the step's replicas.
///
/// The first and second moment slots hold one entry per parameter of the shard. Bias
/// correction is folded into the step size: `lr_t = lr * sqrt(1 - β2^t) / (1 - β1^t)`.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: i32,
    m: Box<[f32]>,
    v: Box<[f32]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance updates.
    /// * `learning_rate` - The size of a step.
    /// * `beta1` - Decay of the first moment estimate.
    /// * `beta2` - Decay of the second moment estimate.
    /// * `epsilon` - Keeps the denominator away from zero.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
        }
    }

    fn step_size(&self) -> f32 {
        let bias1 = 1. - self.beta1.powi(self.t);
        let bias2 = 1. - self.beta2.powi(self.t);
        self.learning_rate * bias2.sqrt() / bias1
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(grad.len(), params.len())?;
        SizeMismatchErr::check(params.len(), self.m.len())?;

        self.t = self.t.saturating_add(1);
        let lr_t = self.step_size();
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);

        for (i, p) in params.iter_mut().enumerate() {
            let g = grad[i];
            let m = &mut self.m[i];
            let v = &mut self.v[i];

            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + eps);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adam(len: usize) -> Adam {
        Adam::new(len, 0.01, 0.9, 0.999, 1e-8)
    }

    #[test]
    fn constant_gradient_moves_by_the_learning_rate_every_step() {
        let mut optimizer = adam(2);
        let mut params = [0., 0.];

        for _ in 0..3 {
            optimizer.update_params(&[4., -0.25], &mut params).unwrap();
        }

        assert!((params[0] + 0.03).abs() < 1e-5);
        assert!((params[1] - 0.03).abs() < 1e-5);
    }

    #[test]
    fn zero_gradient_keeps_params() {
        let mut optimizer = adam(3);
        let mut params = [1., 2., 3.];

        optimizer.update_params(&[0.; 3], &mut params).unwrap();
        assert_eq!(params, [1., 2., 3.]);
    }

    #[test]
    fn rejects_wrong_sizes() {
        let mut optimizer = adam(2);

        assert!(optimizer.update_params(&[1.], &mut [0.; 2]).is_err());
        assert!(optimizer.update_params(&[1.; 3], &mut [0.; 3]).is_err());
    }
}
