use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// The specification for the `Distribution` trait.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionSpec {
    Uniform { low: f32, high: f32 },
    TruncatedNormal { mean: f32, std_dev: f32 },
}

/// The specification for the `ParamGen` trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenSpec {
    Const {
        value: f32,
        limit: usize,
    },
    Rand {
        distribution: DistributionSpec,
        limit: usize,
    },
    Chained {
        specs: Vec<ParamGenSpec>,
    },
}

impl ParamGenSpec {
    /// Returns the amount of parameters this specification generates.
    pub fn len(&self) -> usize {
        match self {
            ParamGenSpec::Const { limit, .. } | ParamGenSpec::Rand { limit, .. } => *limit,
            ParamGenSpec::Chained { specs } => specs.iter().map(Self::len).sum(),
        }
    }

    /// Returns `true` if this specification generates no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
}

impl OptimizerSpec {
    /// Creates an `Adam` specification with the usual default hyperparameters.
    ///
    /// # Arguments
    /// * `learning_rate` - The learning rate of the optimizer.
    pub fn adam(learning_rate: f32) -> Self {
        Self::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// The specification for the `Synchronizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizerSpec {
    Barrier { replicas_to_aggregate: usize },
    NonBlocking,
}

/// The specification sent by the chief worker to initialize a parameter server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub shard_size: NonZeroUsize,
    pub param_gen: ParamGenSpec,
    pub optimizer: OptimizerSpec,
    pub synchronizer: SynchronizerSpec,
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_len_sums_children() {
        let spec = ParamGenSpec::Chained {
            specs: vec![
                ParamGenSpec::Const { value: 0., limit: 3 },
                ParamGenSpec::Chained {
                    specs: vec![ParamGenSpec::Rand {
                        distribution: DistributionSpec::TruncatedNormal {
                            mean: 0.,
                            std_dev: 1.,
                        },
                        limit: 4,
                    }],
                },
            ],
        };

        assert_eq!(spec.len(), 7);
        assert!(ParamGenSpec::Chained { specs: vec![] }.is_empty());
    }

    #[test]
    fn snake_case_wire_names() {
        let json = serde_json::to_string(&SynchronizerSpec::Barrier {
            replicas_to_aggregate: 4,
        })
        .unwrap();

        assert_eq!(json, r#"{"barrier":{"replicas_to_aggregate":4}}"#);
    }

    #[test]
    fn distributions_on_the_wire() {
        let uniform = DistributionSpec::Uniform { low: -1., high: 1. };
        let json = serde_json::to_string(&uniform).unwrap();

        assert_eq!(json, r#"{"uniform":{"low":-1.0,"high":1.0}}"#);

        let unknown = r#"{"xavier":{"fan_in":1,"fan_out":1}}"#;
        assert!(serde_json::from_str::<DistributionSpec>(unknown).is_err());
    }
}
