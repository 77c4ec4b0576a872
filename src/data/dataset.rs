// ============================================================
// Layer 4 - In-Memory Video Dataset
// ============================================================
// Holds decoded video samples in memory and serves them through
// the DataProvider / VideoSplit contract.
//
// Batch traversal:
//   batch i covers samples [i * batch_size, (i + 1) * batch_size).
//   When the next batch would run past the end, the split starts
//   a new epoch (reshuffling if enabled) and serves from the top.
//   A batch is therefore always complete; leftovers at the end of
//   an epoch are skipped, never padded.
//
// Reference: Rust Book §8 (Vectors), rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::batch::VideoBatchData;
use crate::domain::error::{DenseNetError, Result};
use crate::domain::traits::{DataProvider, VideoSplit};

/// One video, flattened row-major as [seq_len, height, width, channels]
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSample {
    pub video: Vec<f32>,
    pub label: usize,
}

// ─── InMemorySplit ────────────────────────────────────────────────────────────
pub struct InMemorySplit {
    name:          String,
    samples:       Vec<VideoSample>,
    n_classes:     usize,
    batch_counter: usize,
    rng:           Option<StdRng>,
}

impl InMemorySplit {
    pub fn new(name: impl Into<String>, samples: Vec<VideoSample>, n_classes: usize) -> Self {
        Self {
            name: name.into(),
            samples,
            n_classes,
            batch_counter: 0,
            rng: None,
        }
    }

    /// Reshuffle the samples at the start of every epoch,
    /// deterministically for a given seed.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
        self.rng = Some(rng);
        self
    }

    fn start_new_epoch(&mut self) {
        self.batch_counter = 0;
        if let Some(rng) = self.rng.as_mut() {
            self.samples.shuffle(rng);
        }
    }
}

impl VideoSplit for InMemorySplit {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_examples(&self) -> usize {
        self.samples.len()
    }

    fn next_batch(&mut self, batch_size: usize) -> Result<VideoBatchData> {
        if batch_size == 0 || batch_size > self.samples.len() {
            return Err(DenseNetError::EmptySplit {
                split:        self.name.clone(),
                num_examples: self.samples.len(),
                batch_size,
            });
        }

        let start = self.batch_counter * batch_size;
        let end   = start + batch_size;
        if end > self.samples.len() {
            self.start_new_epoch();
            return self.next_batch(batch_size);
        }
        self.batch_counter += 1;

        let batch = &self.samples[start..end];
        let videos: Vec<f32> = batch
            .iter()
            .flat_map(|s| s.video.iter().copied())
            .collect();
        let mut labels = vec![0.0f32; batch_size * self.n_classes];
        for (row, sample) in batch.iter().enumerate() {
            labels[row * self.n_classes + sample.label] = 1.0;
        }

        Ok(VideoBatchData { videos, labels, batch_size })
    }
}

// ─── InMemoryProvider ─────────────────────────────────────────────────────────
pub struct InMemoryProvider {
    data_shape: Vec<usize>,
    n_classes:  usize,
    train:      InMemorySplit,
    validation: Option<InMemorySplit>,
    test:       Option<InMemorySplit>,
}

impl InMemoryProvider {
    /// Build a provider around a training split. Every sample is
    /// checked against `data_shape` and `n_classes` up front.
    pub fn new(data_shape: Vec<usize>, n_classes: usize, train: Vec<VideoSample>) -> Result<Self> {
        if data_shape.len() != 4 || data_shape.contains(&0) {
            return Err(DenseNetError::config(format!(
                "data_shape must be [seq_len, height, width, channels] with non-zero \
                 entries, got {data_shape:?}"
            )));
        }
        if n_classes == 0 {
            return Err(DenseNetError::config("n_classes must be positive, got 0"));
        }
        check_samples(&train, &data_shape, n_classes)?;
        Ok(Self {
            train: InMemorySplit::new("train", train, n_classes),
            data_shape,
            n_classes,
            validation: None,
            test: None,
        })
    }

    pub fn with_validation(mut self, samples: Vec<VideoSample>) -> Result<Self> {
        check_samples(&samples, &self.data_shape, self.n_classes)?;
        self.validation = Some(InMemorySplit::new("validation", samples, self.n_classes));
        Ok(self)
    }

    pub fn with_test(mut self, samples: Vec<VideoSample>) -> Result<Self> {
        check_samples(&samples, &self.data_shape, self.n_classes)?;
        self.test = Some(InMemorySplit::new("test", samples, self.n_classes));
        Ok(self)
    }

    /// Reshuffle the training split every epoch
    pub fn with_shuffled_train(mut self, seed: u64) -> Self {
        self.train = self.train.shuffled(seed);
        self
    }
}

impl DataProvider for InMemoryProvider {
    fn data_shape(&self) -> &[usize] {
        &self.data_shape
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn train(&mut self) -> &mut dyn VideoSplit {
        &mut self.train
    }

    fn validation(&mut self) -> Option<&mut dyn VideoSplit> {
        self.validation.as_mut().map(|s| s as &mut dyn VideoSplit)
    }

    fn test(&mut self) -> Option<&mut dyn VideoSplit> {
        self.test.as_mut().map(|s| s as &mut dyn VideoSplit)
    }
}

fn check_samples(samples: &[VideoSample], data_shape: &[usize], n_classes: usize) -> Result<()> {
    let sample_len: usize = data_shape.iter().product();
    for sample in samples {
        if sample.video.len() != sample_len {
            return Err(DenseNetError::ShapeMismatch {
                what:     "video sample length",
                expected: vec![sample_len],
                actual:   vec![sample.video.len()],
            });
        }
        if sample.label >= n_classes {
            return Err(DenseNetError::ShapeMismatch {
                what:     "label index (must be below n_classes)",
                expected: vec![n_classes],
                actual:   vec![sample.label],
            });
        }
    }
    Ok(())
}
