use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::Result;

/// How many standard deviations away from the mean a sample may land.
const CUTOFF: f32 = 2.;

/// A normal distribution whose samples further than two standard deviations
/// from the mean are discarded and drawn again.
#[derive(Debug, Clone, Copy)]
pub struct TruncatedNormal {
    normal: Normal<f32>,
    mean: f32,
    bound: f32,
}

impl TruncatedNormal {
    /// Creates a new `TruncatedNormal` distribution.
    ///
    /// # Arguments
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the untruncated distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is negative or not finite.
    pub fn new(mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self {
            normal: Normal::new(mean, std_dev)?,
            mean,
            bound: CUTOFF * std_dev,
        })
    }
}

impl Distribution<f32> for TruncatedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        loop {
            let x = self.normal.sample(rng);
            if (x - self.mean).abs() <= self.bound {
                return x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn samples_stay_within_two_standard_deviations() {
        let dist = TruncatedNormal::new(1., 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let samples: Vec<f32> = (0..10_000).map(|_| dist.sample(&mut rng)).collect();
        assert!(samples.iter().all(|x| (0. ..=2.).contains(x)));

        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!((mean - 1.).abs() < 0.05);
    }

    #[test]
    fn zero_deviation_is_the_mean() {
        let dist = TruncatedNormal::new(3., 0.).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(dist.sample(&mut rng), 3.);
    }

    #[test]
    fn rejects_invalid_deviation() {
        assert!(TruncatedNormal::new(0., f32::NAN).is_err());
    }
}
