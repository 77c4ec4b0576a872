// ============================================================
// Layer 4 - Video Batcher
// ============================================================
// Converts a framework-free VideoBatchData into backend tensors
// on the target device.
//
// How batching works here:
//   Input:  flat videos of length N·D·H·W·C, flat one-hot labels
//           of length N·n_classes
//   Output: VideoBatch with videos [N, D, H, W, C] and labels
//           [N, n_classes]
//
// Both lengths are checked against the declared data shape and
// class count before any tensor is created, so a provider that
// disagrees with the network fails at the first bad batch with a
// ShapeMismatch naming both shapes.
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use burn::{prelude::*, tensor::TensorData};

use crate::domain::batch::VideoBatchData;
use crate::domain::error::{DenseNetError, Result};

// ─── VideoBatch ───────────────────────────────────────────────────────────────
/// A batch ready for the model forward pass
#[derive(Debug, Clone)]
pub struct VideoBatch<B: Backend> {
    /// [batch, sequence_length, height, width, channels]
    pub videos: Tensor<B, 5>,
    /// One-hot, [batch, n_classes]
    pub labels: Tensor<B, 2>,
}

// ─── VideoBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct VideoBatcher<B: Backend> {
    device:     B::Device,
    data_shape: [usize; 4],
    n_classes:  usize,
}

impl<B: Backend> VideoBatcher<B> {
    pub fn new(device: B::Device, data_shape: &[usize], n_classes: usize) -> Result<Self> {
        let data_shape: [usize; 4] = data_shape.try_into().map_err(|_| {
            DenseNetError::config(format!(
                "data_shape must have rank 4 [seq_len, height, width, channels], got {data_shape:?}"
            ))
        })?;
        Ok(Self { device, data_shape, n_classes })
    }

    pub fn batch(&self, data: VideoBatchData) -> Result<VideoBatch<B>> {
        let [d, h, w, c] = self.data_shape;
        let n = data.batch_size;

        if data.videos.len() != n * d * h * w * c {
            return Err(DenseNetError::ShapeMismatch {
                what:     "video batch",
                expected: vec![n, d, h, w, c],
                actual:   vec![data.videos.len()],
            });
        }
        if data.labels.len() != n * self.n_classes {
            return Err(DenseNetError::ShapeMismatch {
                what:     "label batch",
                expected: vec![n, self.n_classes],
                actual:   vec![data.labels.len()],
            });
        }

        let videos = Tensor::<B, 5>::from_data(
            TensorData::new(data.videos, [n, d, h, w, c]),
            &self.device,
        );
        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(data.labels, [n, self.n_classes]),
            &self.device,
        );
        Ok(VideoBatch { videos, labels })
    }
}
