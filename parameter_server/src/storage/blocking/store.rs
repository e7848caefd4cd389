use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use rayon::prelude::*;

use super::BlockingShard;
use crate::{
    initialization::ParamGen,
    optimization::Optimizer,
    storage::{Result, SizeMismatchErr, Store},
};

/// Partitions the parameters in shards and leverages parallelization
/// to read and write data as fast as possible.
#[derive(Debug)]
pub struct BlockingStore<O: Optimizer> {
    nparams: usize,
    active_idx: Arc<AtomicU8>,
    updating: Arc<AtomicBool>,
    shards: Arc<[BlockingShard<O>]>,
    shard_size: NonZeroUsize,
}

impl<O: Optimizer> Clone for BlockingStore<O> {
    fn clone(&self) -> Self {
        Self {
            nparams: self.nparams,
            active_idx: Arc::clone(&self.active_idx),
            updating: Arc::clone(&self.updating),
            shards: Arc::clone(&self.shards),
            shard_size: self.shard_size,
        }
    }
}

impl<O: Optimizer> BlockingStore<O> {
    /// Creates a new `BlockingStore` parameter store.
    ///
    /// # Arguments
    /// * `shard_size` - The maximum amount of parameters per shard.
    /// * `param_gen` - A parameter generator, the store holds everything it generates.
    /// * `optimizer_factory` - An `Optimizer` factory closure, called once per shard with its size.
    ///
    /// # Returns
    /// A new `BlockingStore` instance.
    pub fn new<PG, OF>(shard_size: NonZeroUsize, mut param_gen: PG, mut optimizer_factory: OF) -> Self
    where
        PG: ParamGen,
        OF: FnMut(usize) -> O,
    {
        let shard_len = shard_size.get();
        let mut nparams = 0;
        let mut shards = Vec::with_capacity(param_gen.remaining().div_ceil(shard_len));

        // Only the last shard may be shorter than `shard_size`.
        loop {
            let mut params = vec![0.; param_gen.remaining().min(shard_len)];
            let written = param_gen.fill(&mut params);
            if written == 0 {
                break;
            }

            params.truncate(written);
            nparams += written;
            shards.push(BlockingShard::new(params, optimizer_factory(written)));

            if written < shard_len {
                break;
            }
        }

        Self {
            nparams,
            active_idx: Arc::new(AtomicU8::new(0)),
            updating: Arc::new(AtomicBool::new(false)),
            shards: Arc::from(shards),
            shard_size,
        }
    }
}

impl<O: Optimizer + Send> Store for BlockingStore<O> {
    fn len(&self) -> usize {
        self.nparams
    }

    fn accumulate(&self, grad: &[f32]) -> Result<()> {
        SizeMismatchErr::check(grad.len(), self.nparams)?;
        let active_idx = self.active_idx.load(Ordering::Acquire) as usize;

        self.shards
            .par_iter()
            .zip(grad.par_chunks(self.shard_size.get()))
            .try_for_each(|(shard, grad_slice)| shard.accumulate(active_idx, grad_slice))
    }

    fn update_params(&self, contributions: usize) -> Result<()> {
        let success = self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();

        if !success {
            return Ok(());
        }

        let frozen_idx = self.active_idx.fetch_xor(1, Ordering::AcqRel) as usize;
        let scale = 1. / contributions.max(1) as f32;

        let res = self
            .shards
            .par_iter()
            .try_for_each(|shard| shard.update_params(frozen_idx, scale));

        self.updating.store(false, Ordering::Release);
        res
    }

    fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        SizeMismatchErr::check(out.len(), self.nparams)?;

        self.shards
            .par_iter()
            .zip(out.par_chunks_mut(self.shard_size.get()))
            .try_for_each(|(shard, out_slice)| shard.pull_params(out_slice))
    }
}
