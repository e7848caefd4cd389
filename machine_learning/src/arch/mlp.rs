use std::ops::Range;

use comms::specs::server::{DistributionSpec, ParamGenSpec};
use ndarray::ArrayView2;

use super::{activations::ActFn, layers::Dense, loss::LossFn};
use crate::{MlErr, Result};

/// A named slice of the model's flat parameter vector together with its initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: &'static str,
    pub range: Range<usize>,
    pub init: ParamGenSpec,
}

impl Variable {
    fn new(name: &'static str, start: usize, init: ParamGenSpec) -> Self {
        let range = start..start + init.len();
        Self { name, range, init }
    }
}

/// A classifier with one hidden layer: `softmax(relu(x·W1 + b1)·W2 + b2)`.
#[derive(Debug, Clone)]
pub struct Mlp {
    hidden: Dense,
    output: Dense,
}

impl Mlp {
    /// Creates a new `Mlp`.
    ///
    /// # Arguments
    /// * `inputs` - The size of every input sample.
    /// * `hidden_units` - The width of the hidden layer.
    /// * `classes` - The amount of output classes.
    ///
    /// # Returns
    /// A new `Mlp` instance.
    pub fn new(inputs: usize, hidden_units: usize, classes: usize) -> Self {
        Self {
            hidden: Dense::new((inputs, hidden_units), ActFn::Relu),
            output: Dense::new((hidden_units, classes), ActFn::Softmax),
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.hidden.size() + self.output.size()
    }

    /// Returns the model's variables in the order they are laid out in the parameter vector.
    ///
    /// Weights are drawn from a normal distribution truncated at two standard deviations
    /// with a standard deviation of `1 / sqrt(fan_in)`, biases start at zero.
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables = Vec::with_capacity(4);
        let mut start = 0;

        for (layer, w_name, b_name) in [
            (&self.hidden, "hid_w", "hid_b"),
            (&self.output, "sm_w", "sm_b"),
        ] {
            let (fan_in, fan_out) = layer.dim();

            let weights = ParamGenSpec::Rand {
                distribution: DistributionSpec::TruncatedNormal {
                    mean: 0.,
                    std_dev: 1. / (fan_in as f32).sqrt(),
                },
                limit: layer.weights_len(),
            };
            let w = Variable::new(w_name, start, weights);
            start = w.range.end;

            let biases = ParamGenSpec::Const {
                value: 0.,
                limit: fan_out,
            };
            let b = Variable::new(b_name, start, biases);
            start = b.range.end;

            variables.extend([w, b]);
        }

        variables
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The predicted class probabilities or an error if sizes don't match.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        let (hid_params, sm_params) = self.split(params)?;

        let h = self.hidden.forward(hid_params, x)?;
        self.output.forward(sm_params, h)
    }

    /// Evaluates the loss of the model over a batch without computing a gradient.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input data.
    /// * `y` - The expected outputs.
    ///
    /// # Returns
    /// The loss or an error if sizes don't match.
    pub fn loss<L: LossFn>(
        &mut self,
        params: &[f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        let y_pred = self.forward(params, x)?;
        Self::check_targets(y_pred, y)?;
        Ok(loss_fn.loss(y_pred, y))
    }

    /// Computes the gradient of the loss with respect to every parameter of the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - Where to write the gradient, laid out like `params`.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input data.
    /// * `y` - The expected outputs.
    ///
    /// # Returns
    /// The loss of the batch or an error if sizes don't match.
    pub fn gradient<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let (hid_params, sm_params) = self.split(params)?;
        let (hid_grad, sm_grad) = grad.split_at_mut(hid_params.len());

        let h = self.hidden.forward(hid_params, x)?;
        let y_pred = self.output.forward(sm_params, h)?;
        Self::check_targets(y_pred, y)?;

        let loss = loss_fn.loss(y_pred, y);
        let d = loss_fn.loss_prime(y_pred, y);

        let d = self.output.backward(sm_params, sm_grad, d)?;
        self.hidden.backward(hid_params, hid_grad, d)?;

        Ok(loss)
    }

    fn split<'a>(&self, params: &'a [f32]) -> Result<(&'a [f32], &'a [f32])> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        Ok(params.split_at(self.hidden.size()))
    }

    fn check_targets(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "targets",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use super::*;
    use crate::arch::loss::CrossEntropy;

    const INPUTS: usize = 3;
    const HIDDEN: usize = 4;
    const CLASSES: usize = 2;

    // Every parameter and input is positive, so the hidden layer stays away from the
    // relu kink and finite differences are meaningful.
    fn positive_params(model: &Mlp) -> Vec<f32> {
        (0..model.size())
            .map(|i| 0.05 + (i % 7) as f32 * 0.03)
            .collect()
    }

    fn batch() -> (Array2<f32>, Array2<f32>) {
        let x = array![[0.2, 0.7, 0.1], [0.9, 0.3, 0.5]];
        let y = array![[1., 0.], [0., 1.]];
        (x, y)
    }

    #[test]
    fn variables_cover_the_parameter_vector() {
        let model = Mlp::new(784, 100, 10);
        let variables = model.variables();

        let names: Vec<_> = variables.iter().map(|v| v.name).collect();
        assert_eq!(names, ["hid_w", "hid_b", "sm_w", "sm_b"]);

        assert_eq!(variables[0].range, 0..78_400);
        assert_eq!(variables[1].range, 78_400..78_500);
        assert_eq!(variables[3].range.end, model.size());

        let ParamGenSpec::Rand {
            distribution: DistributionSpec::TruncatedNormal { std_dev, .. },
            ..
        } = variables[0].init
        else {
            panic!("hid_w should be truncated normal");
        };
        assert!((std_dev - 1. / 28.).abs() < 1e-7);

        let ParamGenSpec::Rand {
            distribution: DistributionSpec::TruncatedNormal { std_dev, .. },
            ..
        } = variables[2].init
        else {
            panic!("sm_w should be truncated normal");
        };
        assert!((std_dev - 0.1).abs() < 1e-7);
    }

    #[test]
    fn output_bias_gradient_is_prediction_minus_target() {
        let mut model = Mlp::new(INPUTS, HIDDEN, CLASSES);
        let params = positive_params(&model);
        let (x, y) = batch();

        let mut grad = vec![0.; model.size()];
        model
            .gradient(&params, &mut grad, &CrossEntropy::new(), x.view(), y.view())
            .unwrap();

        let y_pred = model.forward(&params, x.view()).unwrap().to_owned();
        let expected = (&y_pred - &y).sum_axis(ndarray::Axis(0));

        let sm_b = &grad[model.size() - CLASSES..];
        for (g, e) in sm_b.iter().zip(expected.iter()) {
            assert!((g - e).abs() < 1e-5, "got {g} expected {e}");
        }
    }

    #[test]
    fn gradient_matches_finite_differences() {
        const EPS: f32 = 1e-2;

        let mut model = Mlp::new(INPUTS, HIDDEN, CLASSES);
        let loss_fn = CrossEntropy::new();
        let mut params = positive_params(&model);
        let (x, y) = batch();

        let mut grad = vec![0.; model.size()];
        model
            .gradient(&params, &mut grad, &loss_fn, x.view(), y.view())
            .unwrap();

        for i in (0..model.size()).step_by(3) {
            let original = params[i];

            params[i] = original + EPS;
            let plus = model.loss(&params, &loss_fn, x.view(), y.view()).unwrap();
            params[i] = original - EPS;
            let minus = model.loss(&params, &loss_fn, x.view(), y.view()).unwrap();
            params[i] = original;

            let numeric = (plus - minus) / (2. * EPS);
            assert!(
                (numeric - grad[i]).abs() < 1e-2,
                "param {i}: numeric {numeric} analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn rejects_mismatched_targets() {
        let mut model = Mlp::new(INPUTS, HIDDEN, CLASSES);
        let params = positive_params(&model);
        let x = array![[0.1, 0.2, 0.3]];
        let y = array![[1., 0., 0.]];

        let mut grad = vec![0.; model.size()];
        let res = model.gradient(&params, &mut grad, &CrossEntropy::new(), x.view(), y.view());
        assert!(matches!(res, Err(MlErr::SizeMismatch { what: "targets", .. })));
    }
}
