use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Cross entropy between probability distributions, summed over the whole batch.
///
/// Predictions are clipped to `[min, max]` before taking the logarithm so a probability of
/// exactly zero can't produce an infinite loss. Like any clip, it lets no gradient through
/// for predictions outside of the range.
#[derive(Debug, Clone, Copy)]
pub struct CrossEntropy {
    min: f32,
    max: f32,
}

impl CrossEntropy {
    /// Returns a new `CrossEntropy` clipping predictions to `[1e-10, 1.0]`.
    pub fn new() -> Self {
        Self::with_clip(1e-10, 1.)
    }

    /// Returns a new `CrossEntropy` with a custom clipping range.
    ///
    /// # Arguments
    /// * `min` - The smallest prediction that reaches the logarithm.
    /// * `max` - The largest prediction that reaches the logarithm.
    pub fn with_clip(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn clip(&self, p: f32) -> f32 {
        p.clamp(self.min, self.max)
    }
}

impl Default for CrossEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let mut total = 0.;

        Zip::from(&y_pred)
            .and(&y)
            .for_each(|&p, &y| total -= y * self.clip(p).ln());

        total
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        Zip::from(&y_pred).and(&y).map_collect(|&p, &y| {
            if (self.min..=self.max).contains(&p) {
                -y / p
            } else {
                0.
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn saturated_predictions_stay_finite() {
        let loss_fn = CrossEntropy::new();
        let y = array![[1., 0.], [0., 1.]];
        let y_pred = array![[0., 1.], [0., 1.]];

        let loss = loss_fn.loss(y_pred.view(), y.view());
        assert!(loss.is_finite());
        assert!((loss + 1e-10f32.ln()).abs() < 1e-3);

        let d = loss_fn.loss_prime(y_pred.view(), y.view());
        assert!(d.iter().all(|x| x.is_finite()));
        assert_eq!(d[[0, 0]], 0.);
        assert_eq!(d[[1, 1]], -1.);
    }

    #[test]
    fn perfect_prediction_has_zero_loss() {
        let loss_fn = CrossEntropy::new();
        let y = array![[0., 1., 0.]];

        assert_eq!(loss_fn.loss(y.view(), y.view()), 0.);
    }

    #[test]
    fn loss_is_summed_over_the_batch() {
        let loss_fn = CrossEntropy::new();
        let y = array![[1., 0.], [1., 0.]];
        let y_pred = array![[0.5, 0.5], [0.5, 0.5]];

        let expected = -2. * 0.5f32.ln();
        assert!((loss_fn.loss(y_pred.view(), y.view()) - expected).abs() < 1e-6);
    }
}
