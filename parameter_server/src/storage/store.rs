use super::Result;

/// The storage of a parameter server's slice of the model.
///
/// Implementations are blocking and CPU bound, the async side reaches them through a `StoreHandle`.
pub trait Store {
    /// Returns the amount of parameters in the storage.
    fn len(&self) -> usize;

    /// Returns `true` if this server holds no parameters at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accumulates a new gradient into the active gradient buffer.
    ///
    /// # Arguments
    /// * `grad` - A flat slice containing a gradient for every parameter.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `grad` isn't the same size as the storage.
    fn accumulate(&self, grad: &[f32]) -> Result<()>;

    /// Applies the accumulated gradient to the parameters.
    ///
    /// # Arguments
    /// * `contributions` - How many gradients were accumulated, the optimizer sees their mean.
    fn update_params(&self, contributions: usize) -> Result<()>;

    /// Copies the parameters into `out`.
    ///
    /// # Arguments
    /// * `out` - A mutable slice where the parameters will be copied.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `out` isn't the same size as the storage.
    fn pull_params(&self, out: &mut [f32]) -> Result<()>;
}
