// ============================================================
// Layer 4 - Synthetic Video Provider
// ============================================================
// Generates a seeded, class-separable video dataset so the whole
// pipeline can be trained and evaluated without external files.
//
// Each sample of class c is uniform noise in [-0.5, 0.5) shifted
// by an offset that depends on c:
//
//   value = noise + (c - (n_classes - 1) / 2) * CLASS_OFFSET
//
// Labels are balanced (sample i has label i mod n_classes) and the
// order is shuffled once with the same seed. The same config
// always produces byte-identical splits.
//
// Reference: rand crate documentation (StdRng, seed_from_u64)

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::dataset::{InMemoryProvider, VideoSample};
use crate::domain::error::Result;

const CLASS_OFFSET: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub n_classes:      usize,
    /// [sequence_length, height, width, channels]
    pub data_shape:     Vec<usize>,
    pub train_examples: usize,
    pub valid_examples: usize,
    pub test_examples:  usize,
    pub seed:           u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_classes:      2,
            data_shape:     vec![8, 32, 32, 3],
            train_examples: 64,
            valid_examples: 16,
            test_examples:  16,
            seed:           42,
        }
    }
}

impl SyntheticConfig {
    /// Build the in-memory provider. Empty validation or test sizes
    /// leave that split absent. The training split is reshuffled
    /// every epoch.
    pub fn build(&self) -> Result<InMemoryProvider> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_len: usize = self.data_shape.iter().product();

        let train = generate(&mut rng, self.train_examples, sample_len, self.n_classes);
        let valid = generate(&mut rng, self.valid_examples, sample_len, self.n_classes);
        let test  = generate(&mut rng, self.test_examples, sample_len, self.n_classes);

        let mut provider = InMemoryProvider::new(self.data_shape.clone(), self.n_classes, train)?
            .with_shuffled_train(self.seed.wrapping_add(1));
        if !valid.is_empty() {
            provider = provider.with_validation(valid)?;
        }
        if !test.is_empty() {
            provider = provider.with_test(test)?;
        }

        tracing::info!(
            "Synthetic data: {} train / {} valid / {} test examples, shape {:?}, {} classes",
            self.train_examples, self.valid_examples, self.test_examples,
            self.data_shape, self.n_classes,
        );
        Ok(provider)
    }
}

fn generate(rng: &mut StdRng, count: usize, sample_len: usize, n_classes: usize) -> Vec<VideoSample> {
    if n_classes == 0 {
        return Vec::new();
    }
    let centre = (n_classes as f32 - 1.0) / 2.0;
    let mut samples: Vec<VideoSample> = (0..count)
        .map(|i| {
            let label  = i % n_classes;
            let offset = (label as f32 - centre) * CLASS_OFFSET;
            let video  = (0..sample_len)
                .map(|_| rng.gen_range(-0.5f32..0.5) + offset)
                .collect();
            VideoSample { video, label }
        })
        .collect();
    samples.shuffle(rng);
    samples
}
