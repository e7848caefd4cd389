use ndarray::{Array2, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{MlErr, Result};

/// Anything that can hand out training batches.
pub trait BatchSource {
    /// Takes the next `batch_size` samples.
    ///
    /// # Returns
    /// A tuple of `(inputs, one-hot targets)`, one sample per row.
    fn next_batch(&mut self, batch_size: usize) -> (Array2<f32>, Array2<f32>);
}

/// An in-memory set of samples iterated in shuffled epochs.
#[derive(Debug, Clone)]
pub struct DataSet {
    images: Array2<f32>,
    labels: Array2<f32>,
    perm: Vec<usize>,
    cursor: usize,
    epochs_completed: usize,
    rng: StdRng,
}

impl DataSet {
    /// Creates a new `DataSet`, shuffling its first epoch.
    ///
    /// # Arguments
    /// * `images` - The inputs, one sample per row.
    /// * `labels` - The one-hot targets, one sample per row.
    /// * `seed` - The seed of the shuffling rng.
    ///
    /// # Returns
    /// A new `DataSet` or an error if it would be empty or the row counts differ.
    pub fn new(images: Array2<f32>, labels: Array2<f32>, seed: u64) -> Result<Self> {
        if images.nrows() != labels.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: labels.nrows(),
                expected: images.nrows(),
            });
        }

        if images.nrows() == 0 {
            return Err(MlErr::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut perm: Vec<_> = (0..images.nrows()).collect();
        perm.shuffle(&mut rng);

        Ok(Self {
            images,
            labels,
            perm,
            cursor: 0,
            epochs_completed: 0,
            rng,
        })
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.perm.len()
    }

    /// Always `false`, an empty `DataSet` can't be built.
    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn images(&self) -> ArrayView2<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> ArrayView2<'_, f32> {
        self.labels.view()
    }

    /// Returns how many full passes over the samples have been handed out.
    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }
}

impl BatchSource for DataSet {
    /// Batches are consecutive slices of the current permutation. When an epoch runs out
    /// the samples are reshuffled and the batch is completed with the start of the next one.
    fn next_batch(&mut self, batch_size: usize) -> (Array2<f32>, Array2<f32>) {
        let mut indices = Vec::with_capacity(batch_size);

        while indices.len() < batch_size {
            if self.cursor == self.perm.len() {
                self.epochs_completed += 1;
                self.perm.shuffle(&mut self.rng);
                self.cursor = 0;
            }

            let take = (batch_size - indices.len()).min(self.perm.len() - self.cursor);
            indices.extend_from_slice(&self.perm[self.cursor..self.cursor + take]);
            self.cursor += take;
        }

        (
            self.images.select(Axis(0), &indices),
            self.labels.select(Axis(0), &indices),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    // Sample `i` has input `[i]` so batches can be traced back to their rows.
    fn data_set(n: usize) -> DataSet {
        let images = Array2::from_shape_fn((n, 1), |(i, _)| i as f32);
        let labels = Array2::from_shape_fn((n, 2), |(i, j)| ((i + j) % 2) as f32);
        DataSet::new(images, labels, 7).unwrap()
    }

    fn ids(x: &Array2<f32>) -> Vec<usize> {
        x.column(0).iter().map(|&v| v as usize).collect()
    }

    #[test]
    fn one_epoch_visits_every_sample_once() {
        let mut ds = data_set(10);

        let mut seen = Vec::new();
        for _ in 0..5 {
            let (x, _) = ds.next_batch(2);
            seen.extend(ids(&x));
        }

        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(ds.epochs_completed(), 0);
    }

    #[test]
    fn batch_spanning_epochs_is_completed_after_reshuffle() {
        let mut ds = data_set(5);

        let (first, _) = ds.next_batch(3);
        let (second, _) = ds.next_batch(4);
        assert_eq!(second.nrows(), 4);
        assert_eq!(ds.epochs_completed(), 1);

        // The tail of the first epoch is the two samples the first batch didn't take.
        let first: HashSet<_> = ids(&first).into_iter().collect();
        let tail: HashSet<_> = ids(&second)[..2].iter().copied().collect();
        assert!(first.is_disjoint(&tail));
        assert_eq!(first.len() + tail.len(), 5);
    }

    #[test]
    fn labels_follow_their_images() {
        let mut ds = data_set(6);

        let (x, y) = ds.next_batch(6);
        for (id, row) in ids(&x).into_iter().zip(y.rows()) {
            assert_eq!(row[0], (id % 2) as f32);
        }
    }

    #[test]
    fn rejects_empty_and_mismatched() {
        assert!(matches!(
            DataSet::new(Array2::zeros((0, 3)), Array2::zeros((0, 2)), 0),
            Err(MlErr::EmptyDataset)
        ));
        assert!(matches!(
            DataSet::new(Array2::zeros((2, 3)), Array2::zeros((1, 2)), 0),
            Err(MlErr::SizeMismatch { .. })
        ));
    }
}
