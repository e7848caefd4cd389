use std::{cell::RefCell, rc::Rc, sync::Arc};

use comms::specs::server::{
    DistributionSpec, OptimizerSpec, ParamGenSpec, ServerSpec, SynchronizerSpec,
};
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Aggregator, ReplicaAggregator};
use crate::{
    initialization::{ChainedParamGen, ConstParamGen, InitErr, ParamGen, RandParamGen, Result},
    optimization::{Adam, GradientDescent, Optimizer},
    storage::{BlockingStore, StoreHandle},
    synchronization::{BarrierSync, NoBlockingSync},
};

/// Builds the `RandParamGen` a distribution specification asks for and hands it to `callback`.
///
/// Every distribution yields a different concrete type, the callback is expanded once per arm
/// so it gets to see each of them. Construction errors are returned early with `?`.
///
/// # Arguments
/// * `rng` - The rng shared by every random generator of the server.
/// * `dist_spec` - A specification for a distribution.
/// * `limit` - The amount of parameters to generate.
/// * `callback` - What to do with the generator.
macro_rules! with_distribution {
    ($rng:expr, $dist_spec:expr, $limit:expr, $callback:expr) => {
        match $dist_spec {
            DistributionSpec::Uniform { low, high } => {
                ($callback)(RandParamGen::uniform($rng, $limit, low, high)?)
            }
            DistributionSpec::TruncatedNormal { mean, std_dev } => {
                ($callback)(RandParamGen::truncated_normal($rng, $limit, mean, std_dev)?)
            }
        }
    };
}

/// Turns the specification the chief sends into the `Aggregator` of a parameter server.
///
/// Resolution goes parameter generators, then optimizer, then synchronizer, and ends
/// instantiating the sharded store.
#[derive(Debug, Default)]
pub struct ServerBuilder;

impl ServerBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Aggregator` following a spec.
    ///
    /// A seeded spec always yields the same initial parameters.
    ///
    /// # Arguments
    /// * `spec` - The specification of the parameter server.
    ///
    /// # Returns
    /// A new aggregator or an `InitErr` if the specification can't be built.
    pub fn build(&self, spec: ServerSpec) -> Result<Arc<dyn Aggregator>> {
        debug!(
            params = spec.param_gen.len(),
            shard_size = spec.shard_size.get();
            "building aggregator"
        );

        let rng = Rc::new(RefCell::new(match spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }));

        let param_gen = self.resolve_param_gen(&rng, &spec.param_gen)?;
        self.resolve_optimizer(&spec, param_gen)
    }

    /// Resolves the tree of parameter generators of a spec.
    ///
    /// # Arguments
    /// * `rng` - The rng every random generator draws from, in layout order.
    /// * `spec` - A parameter generator specification.
    fn resolve_param_gen<R>(
        &self,
        rng: &Rc<RefCell<R>>,
        spec: &ParamGenSpec,
    ) -> Result<Box<dyn ParamGen>>
    where
        R: Rng + 'static,
    {
        let param_gen: Box<dyn ParamGen> = match *spec {
            ParamGenSpec::Const { value, limit } => Box::new(ConstParamGen::new(value, limit)),
            ParamGenSpec::Rand {
                distribution,
                limit,
            } => with_distribution!(Rc::clone(rng), distribution, limit, |param_gen| {
                Box::new(param_gen) as Box<dyn ParamGen>
            }),
            ParamGenSpec::Chained { ref specs } => {
                let param_gens = specs
                    .iter()
                    .map(|spec| self.resolve_param_gen(rng, spec))
                    .collect::<Result<_>>()?;

                Box::new(ChainedParamGen::new(param_gens))
            }
        };

        Ok(param_gen)
    }

    fn resolve_optimizer(
        &self,
        spec: &ServerSpec,
        param_gen: Box<dyn ParamGen>,
    ) -> Result<Arc<dyn Aggregator>> {
        match spec.optimizer {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let factory = |len| Adam::new(len, learning_rate, beta1, beta2, epsilon);
                self.resolve_synchronizer(spec, param_gen, factory)
            }
            OptimizerSpec::GradientDescent { learning_rate } => {
                let factory = |_| GradientDescent::new(learning_rate);
                self.resolve_synchronizer(spec, param_gen, factory)
            }
        }
    }

    fn resolve_synchronizer<O, OF>(
        &self,
        spec: &ServerSpec,
        param_gen: Box<dyn ParamGen>,
        optimizer_factory: OF,
    ) -> Result<Arc<dyn Aggregator>>
    where
        O: Optimizer + Send + 'static,
        OF: FnMut(usize) -> O,
    {
        let store = BlockingStore::new(spec.shard_size, param_gen, optimizer_factory);
        let handle = StoreHandle::new(store);

        let aggregator: Arc<dyn Aggregator> = match spec.synchronizer {
            SynchronizerSpec::Barrier {
                replicas_to_aggregate: 0,
            } => return Err(InitErr::NoReplicas),
            SynchronizerSpec::Barrier {
                replicas_to_aggregate,
            } => Arc::new(ReplicaAggregator::new(
                handle,
                BarrierSync::new(replicas_to_aggregate),
            )),
            SynchronizerSpec::NonBlocking => {
                Arc::new(ReplicaAggregator::new(handle, NoBlockingSync::new()))
            }
        };

        Ok(aggregator)
    }
}
