use tokio::task;

use super::{Result, Store};

/// The async interface of a `Store`.
///
/// It bridges the async runtime with the blocking CPU-bound implementation of the store,
/// so it must live inside a multi threaded runtime.
#[derive(Debug, Clone)]
pub struct StoreHandle<S: Store>(S);

impl<S: Store> StoreHandle<S> {
    /// Creates a new `StoreHandle`.
    ///
    /// # Arguments
    /// * `store` - The underlying parameter store.
    ///
    /// # Returns
    /// A new `StoreHandle` instance.
    pub fn new(store: S) -> Self {
        Self(store)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Async call to the synchronous implementation of `Store::accumulate`.
    pub async fn accumulate(&self, grad: &[f32]) -> Result<()> {
        task::block_in_place(|| self.0.accumulate(grad))
    }

    /// Async call to the synchronous implementation of `Store::update_params`.
    pub async fn update_params(&self, contributions: usize) -> Result<()> {
        task::block_in_place(|| self.0.update_params(contributions))
    }

    /// Async call to the synchronous implementation of `Store::pull_params`.
    pub async fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        task::block_in_place(|| self.0.pull_params(out))
    }
}
