use comms::specs::server::ParamGenSpec;
use log::info;
use machine_learning::arch::Variable;

use crate::{Result, WorkerErr};

/// Round robin placement of the model's variables over the parameter servers.
///
/// Variable `i` lives in server `i % ps_count`. Every server holds the concatenation of its
/// variables in model order, so its local vector is a fixed permutation of slices of the
/// model's flat parameter vector.
#[derive(Debug, Clone)]
pub struct VariablePlacement {
    servers: Vec<Vec<Variable>>,
    model_len: usize,
}

impl VariablePlacement {
    /// Creates a new `VariablePlacement`.
    ///
    /// # Arguments
    /// * `variables` - The model's variables in the order they appear in its parameter vector.
    /// * `ps_count` - The amount of parameter servers.
    ///
    /// # Returns
    /// A new `VariablePlacement` or an error if there are no servers.
    pub fn new(variables: Vec<Variable>, ps_count: usize) -> Result<Self> {
        if ps_count == 0 {
            return Err(WorkerErr::NoParameterServers);
        }

        let model_len = variables.iter().map(|v| v.range.end).max().unwrap_or(0);
        let mut servers = vec![Vec::new(); ps_count];

        for (i, variable) in variables.into_iter().enumerate() {
            servers[i % ps_count].push(variable);
        }

        Ok(Self { servers, model_len })
    }

    /// Logs where every variable was placed.
    pub fn log(&self) {
        for (ps, variables) in self.servers.iter().enumerate() {
            for v in variables {
                info!(variable = v.name, ps = ps, params = v.range.len(); "placed variable");
            }
        }
    }

    /// Returns the amount of parameter servers.
    pub fn ps_count(&self) -> usize {
        self.servers.len()
    }

    /// Returns the length of the model's flat parameter vector.
    pub fn model_len(&self) -> usize {
        self.model_len
    }

    /// Returns the amount of parameters held by server `ps`.
    pub fn server_len(&self, ps: usize) -> usize {
        self.servers[ps].iter().map(|v| v.range.len()).sum()
    }

    /// Returns the initializer of every parameter held by server `ps`, in its local order.
    pub fn param_gen(&self, ps: usize) -> ParamGenSpec {
        let specs = self.servers[ps].iter().map(|v| v.init.clone()).collect();
        ParamGenSpec::Chained { specs }
    }

    /// Copies the slices of `model` held by server `ps` into `out`.
    ///
    /// # Arguments
    /// * `ps` - The index of the server.
    /// * `model` - A vector laid out like the model's parameters.
    /// * `out` - The server local vector, `server_len(ps)` long.
    pub fn scatter(&self, ps: usize, model: &[f32], out: &mut [f32]) {
        let mut offset = 0;

        for v in &self.servers[ps] {
            let len = v.range.len();
            out[offset..offset + len].copy_from_slice(&model[v.range.clone()]);
            offset += len;
        }
    }

    /// Writes the server local vector of `ps` back into its slices of `model`.
    ///
    /// # Arguments
    /// * `ps` - The index of the server.
    /// * `local` - The server local vector, `server_len(ps)` long.
    /// * `model` - A vector laid out like the model's parameters.
    pub fn gather(&self, ps: usize, local: &[f32], model: &mut [f32]) {
        let mut offset = 0;

        for v in &self.servers[ps] {
            let len = v.range.len();
            model[v.range.clone()].copy_from_slice(&local[offset..offset + len]);
            offset += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::Mlp;

    use super::*;

    fn placement(ps_count: usize) -> (Mlp, VariablePlacement) {
        let model = Mlp::new(3, 2, 2);
        let placement = VariablePlacement::new(model.variables(), ps_count).unwrap();
        (model, placement)
    }

    #[test]
    fn round_robin_over_servers() {
        let (model, placement) = placement(3);

        // hid_w: 6, hid_b: 2, sm_w: 4, sm_b: 2
        assert_eq!(placement.server_len(0), 6 + 2);
        assert_eq!(placement.server_len(1), 2);
        assert_eq!(placement.server_len(2), 4);

        let total: usize = (0..3).map(|ps| placement.server_len(ps)).sum();
        assert_eq!(total, model.size());
        assert_eq!(placement.model_len(), model.size());
    }

    #[test]
    fn param_gen_matches_server_len() {
        let (_, placement) = placement(2);

        for ps in 0..2 {
            assert_eq!(placement.param_gen(ps).len(), placement.server_len(ps));
        }
    }

    #[test]
    fn scatter_then_gather_restores_the_model() {
        let (model, placement) = placement(3);
        let original: Vec<f32> = (0..model.size()).map(|i| i as f32).collect();
        let mut restored = vec![0.; model.size()];

        for ps in 0..placement.ps_count() {
            let mut local = vec![0.; placement.server_len(ps)];
            placement.scatter(ps, &original, &mut local);
            placement.gather(ps, &local, &mut restored);
        }

        assert_eq!(restored, original);
    }

    #[test]
    fn server_zero_holds_weights_first() {
        let (_, placement) = placement(3);
        let model: Vec<f32> = (0..14).map(|i| i as f32).collect();

        let mut local = vec![0.; placement.server_len(0)];
        placement.scatter(0, &model, &mut local);

        // hid_w is 0..6 and sm_b is 12..14
        assert_eq!(local, [0., 1., 2., 3., 4., 5., 12., 13.]);
    }

    #[test]
    fn more_servers_than_variables() {
        let (_, placement) = placement(6);

        assert_eq!(placement.server_len(4), 0);
        assert!(placement.param_gen(5).is_empty());
    }

    #[test]
    fn no_servers_fails() {
        let model = Mlp::new(3, 2, 2);
        assert!(matches!(
            VariablePlacement::new(model.variables(), 0),
            Err(WorkerErr::NoParameterServers)
        ));
    }
}
