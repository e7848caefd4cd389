use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, Zip};

/// The activation function applied at the output of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActFn {
    Relu,
    Softmax,
}

impl ActFn {
    /// Applies the activation to the pre-activations `z`, writing the result into `a`.
    ///
    /// # Arguments
    /// * `z` - The pre-activations, one sample per row.
    /// * `a` - The output buffer, must have the same shape as `z`.
    pub fn forward(&self, z: ArrayView2<f32>, a: &mut Array2<f32>) {
        match self {
            ActFn::Relu => a.zip_mut_with(&z, |a, &z| *a = z.max(0.)),
            ActFn::Softmax => {
                a.assign(&z);

                for mut row in a.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
                    row.mapv_inplace(|x| (x - max).exp());

                    let sum = row.sum();
                    row.mapv_inplace(|x| x / sum);
                }
            }
        }
    }

    /// Turns the delta with respect to the activations into the delta with respect to the
    /// pre-activations in place.
    ///
    /// # Arguments
    /// * `z` - The pre-activations of the forward pass.
    /// * `a` - The activations of the forward pass.
    /// * `d` - The delta to transform.
    pub fn backward(&self, z: ArrayView2<f32>, a: ArrayView2<f32>, mut d: ArrayViewMut2<f32>) {
        match self {
            ActFn::Relu => d.zip_mut_with(&z, |d, &z| {
                if z <= 0. {
                    *d = 0.;
                }
            }),
            ActFn::Softmax => {
                Zip::from(d.rows_mut()).and(a.rows()).for_each(|mut d, a| {
                    let dot = d.dot(&a);
                    d.zip_mut_with(&a, |d, &a| *d = a * (*d - dot));
                });
            }
        }
    }
}
