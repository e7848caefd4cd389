mod data_set;
mod idx;
mod mnist;

pub use data_set::{BatchSource, DataSet};
pub use mnist::{CLASSES, IMAGE_SIZE, Mnist, VALIDATION_SIZE};
