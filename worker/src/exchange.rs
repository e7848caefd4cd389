use crate::Result;

/// A synchronized gradient exchange, the only thing the training loop needs from a session.
#[trait_variant::make(GradientExchange: Send)]
pub trait LocalGradientExchange {
    /// Returns the model's parameters for the current global step.
    fn params(&self) -> &[f32];

    /// Returns the current global step.
    fn global_step(&self) -> u64;

    /// Contributes `grad` to the current step and waits until the step is applied.
    ///
    /// # Arguments
    /// * `grad` - The gradient, laid out like the model's parameters.
    ///
    /// # Returns
    /// The new global step.
    async fn step(&mut self, grad: &[f32]) -> Result<u64>;
}
