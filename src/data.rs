//! Synthetic datasets and batching for run state fixtures
//!
//! Run states need real tensors flowing through a real dataloader without
//! touching disk. The random classification dataset is a seeded Gaussian
//! blob with integer labels; [`Loader`] slices it into mini-batches.

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::checkout::Checkout;
use crate::error::{Error, Result};

/// Shape of a generated classification dataset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RandomClassificationConfig {
    /// Number of samples to generate
    pub num_samples: usize,
    /// Features per sample
    pub num_features: usize,
    /// Number of label classes
    pub num_classes: usize,
    /// Seed for the generator
    pub seed: u64,
}

impl Default for RandomClassificationConfig {
    fn default() -> Self {
        Self {
            num_samples: 32,
            num_features: 8,
            num_classes: 2,
            seed: 0,
        }
    }
}

/// Seeded synthetic classification dataset held fully in memory
#[derive(Debug, Clone)]
pub struct RandomClassificationDataset {
    config: RandomClassificationConfig,
    features: Tensor,
    labels: Tensor,
}

impl RandomClassificationDataset {
    /// Generate the dataset described by `config` on `device`.
    ///
    /// Generation is deterministic in the config seed, so two datasets with
    /// the same config hold identical tensors.
    pub fn generate(config: &RandomClassificationConfig, device: &Device) -> Result<Self> {
        if config.num_samples == 0 || config.num_features == 0 || config.num_classes == 0 {
            return Err(Error::config("dataset dimensions must be non-zero"));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let normal = Normal::new(0.0f32, 1.0).map_err(|e| Error::config(e.to_string()))?;

        let mut features = Vec::with_capacity(config.num_samples * config.num_features);
        for _ in 0..config.num_samples * config.num_features {
            features.push(normal.sample(&mut rng));
        }
        let labels: Vec<u32> = (0..config.num_samples)
            .map(|_| rng.random_range(0..config.num_classes as u32))
            .collect();

        let features = Tensor::from_vec(
            features,
            (config.num_samples, config.num_features),
            device,
        )?;
        let labels = Tensor::from_vec(labels, config.num_samples, device)?;

        Ok(Self {
            config: *config,
            features,
            labels,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.config.num_samples
    }

    /// Whether the dataset holds no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shape this dataset was generated with
    pub fn config(&self) -> &RandomClassificationConfig {
        &self.config
    }

    /// The full `(num_samples, num_features)` feature tensor
    pub fn features(&self) -> &Tensor {
        &self.features
    }

    /// The full `(num_samples,)` label tensor
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    /// One sample as `(features, label)`
    pub fn sample(&self, index: usize) -> Result<(Tensor, u32)> {
        let features = self.features.get(index)?;
        let label = self.labels.get(index)?.to_scalar::<u32>()?;
        Ok((features, label))
    }
}

/// Mini-batch view over a generated dataset
#[derive(Debug, Clone)]
pub struct Loader {
    features: Tensor,
    labels: Tensor,
    num_samples: usize,
    batch_size: usize,
}

impl Loader {
    /// Loader over `dataset` with the given batch size
    pub fn new(dataset: &RandomClassificationDataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch size must be non-zero"));
        }
        Ok(Self {
            features: dataset.features().clone(),
            labels: dataset.labels().clone(),
            num_samples: dataset.len(),
            batch_size,
        })
    }

    /// Samples per batch; the final batch may be short
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of samples behind the loader
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Number of batches one pass yields
    pub fn num_batches(&self) -> usize {
        self.num_samples.div_ceil(self.batch_size)
    }

    /// The `index`th batch as `(features, labels)`
    pub fn batch(&self, index: usize) -> Result<(Tensor, Tensor)> {
        let start = index
            .checked_mul(self.batch_size)
            .filter(|start| *start < self.num_samples)
            .ok_or_else(|| {
                Error::config(format!(
                    "batch index {} out of range for {} batches",
                    index,
                    self.num_batches()
                ))
            })?;
        let len = self.batch_size.min(self.num_samples - start);
        let features = self.features.narrow(0, start, len)?;
        let labels = self.labels.narrow(0, start, len)?;
        Ok((features, labels))
    }

    /// Iterate over all batches in order
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            loader: self,
            next: 0,
        }
    }
}

impl Checkout for Loader {
    fn checkout(&self) -> Result<Self> {
        // Tensor::clone shares storage; copy into fresh buffers instead.
        Ok(Self {
            features: self.features.copy()?,
            labels: self.labels.copy()?,
            num_samples: self.num_samples,
            batch_size: self.batch_size,
        })
    }
}

/// Iterator over a loader's batches
pub struct Batches<'a> {
    loader: &'a Loader,
    next: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<(Tensor, Tensor)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.loader.num_batches() {
            return None;
        }
        let batch = self.loader.batch(self.next);
        self.next += 1;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use candle_core::Device;

    fn dataset(config: &RandomClassificationConfig) -> RandomClassificationDataset {
        RandomClassificationDataset::generate(config, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_generation_is_deterministic_in_the_seed() {
        let config = RandomClassificationConfig::default();
        let a = dataset(&config);
        let b = dataset(&config);
        assert_eq!(
            a.features().to_vec2::<f32>().unwrap(),
            b.features().to_vec2::<f32>().unwrap()
        );
        assert_eq!(
            a.labels().to_vec1::<u32>().unwrap(),
            b.labels().to_vec1::<u32>().unwrap()
        );

        let other = dataset(&RandomClassificationConfig {
            seed: 1,
            ..config
        });
        assert_ne!(
            a.features().to_vec2::<f32>().unwrap(),
            other.features().to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_labels_stay_in_class_range() {
        let config = RandomClassificationConfig {
            num_classes: 3,
            ..Default::default()
        };
        let data = dataset(&config);
        for label in data.labels().to_vec1::<u32>().unwrap() {
            assert!(label < 3);
        }
    }

    #[test]
    fn test_features_look_standard_normal() {
        let config = RandomClassificationConfig {
            num_samples: 512,
            ..Default::default()
        };
        let data = dataset(&config);
        let mean = data.features().mean_all().unwrap().to_scalar::<f32>().unwrap();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.1);
    }

    #[test]
    fn test_zero_sized_configs_are_rejected() {
        let config = RandomClassificationConfig {
            num_samples: 0,
            ..Default::default()
        };
        assert!(RandomClassificationDataset::generate(&config, &Device::Cpu).is_err());
    }

    #[test]
    fn test_loader_batches_cover_the_dataset() {
        let config = RandomClassificationConfig {
            num_samples: 10,
            ..Default::default()
        };
        let loader = Loader::new(&dataset(&config), 4).unwrap();
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<_> = loader.batches().collect::<Result<_>>().unwrap();
        assert_eq!(batches[0].0.dims(), &[4, 8]);
        assert_eq!(batches[1].0.dims(), &[4, 8]);
        assert_eq!(batches[2].0.dims(), &[2, 8]);
        assert_eq!(batches[2].1.dims(), &[2]);
    }

    #[test]
    fn test_loader_rejects_zero_batch_size() {
        let data = dataset(&RandomClassificationConfig::default());
        assert!(Loader::new(&data, 0).is_err());
    }

    #[test]
    fn test_batch_index_out_of_range_is_an_error() {
        let data = dataset(&RandomClassificationConfig::default());
        let loader = Loader::new(&data, 16).unwrap();
        assert!(loader.batch(loader.num_batches()).is_err());
    }

    #[test]
    fn test_overflowing_batch_index_is_an_error() {
        let data = dataset(&RandomClassificationConfig::default());
        let loader = Loader::new(&data, 16).unwrap();
        // Start offsets that overflow must not wrap around to alias batch 0.
        assert!(loader.batch(usize::MAX / 16 + 1).is_err());
        assert!(loader.batch(usize::MAX).is_err());
    }

    #[test]
    fn test_sample_access() {
        let data = dataset(&RandomClassificationConfig::default());
        let (features, label) = data.sample(0).unwrap();
        assert_eq!(features.dims(), &[8]);
        assert!(label < 2);
    }
}
