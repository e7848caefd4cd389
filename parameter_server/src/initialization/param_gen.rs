/// Produces the initial values of a server's parameters, in order.
pub trait ParamGen {
    /// Returns the amount of parameters left to generate.
    fn remaining(&self) -> usize;

    /// Writes the next parameters into `out`.
    ///
    /// # Arguments
    /// * `out` - Where to write, filled from the start.
    ///
    /// # Returns
    /// The amount of parameters written, less than `out.len()` only when the generator ran out.
    fn fill(&mut self, out: &mut [f32]) -> usize;
}

impl<P: ParamGen + ?Sized> ParamGen for Box<P> {
    fn remaining(&self) -> usize {
        (**self).remaining()
    }

    fn fill(&mut self, out: &mut [f32]) -> usize {
        (**self).fill(out)
    }
}
