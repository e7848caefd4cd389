use super::ParamGen;

/// Concatenates the generators of every variable a server holds.
///
/// A single fill may span several generators, exhausted ones are skipped.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen`.
    ///
    /// # Arguments
    /// * `param_gens` - The generators, in the order their parameters are laid out.
    ///
    /// # Returns
    /// A new `ChainedParamGen` instance.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self { param_gens }
    }
}

impl ParamGen for ChainedParamGen {
    fn remaining(&self) -> usize {
        self.param_gens.iter().map(|pg| pg.remaining()).sum()
    }

    fn fill(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;

        for param_gen in &mut self.param_gens {
            if written == out.len() {
                break;
            }

            written += param_gen.fill(&mut out[written..]);
        }

        written
    }
}
