mod chained;
mod constant;
mod error;
mod param_gen;
mod random;
mod truncated_normal;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use error::{InitErr, Result};
pub use param_gen::ParamGen;
pub use random::RandParamGen;
pub use truncated_normal::TruncatedNormal;
