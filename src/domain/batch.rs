// ============================================================
// Layer 3 - VideoBatchData
// ============================================================
// A framework-free batch as produced by a VideoSplit:
//
//   videos: row-major f32, shape [batch, seq_len, height, width, channels]
//   labels: row-major f32 one-hot, shape [batch, n_classes]
//
// The batcher in the data layer turns this into tensors after
// checking both shapes.

#[derive(Debug, Clone, PartialEq)]
pub struct VideoBatchData {
    pub videos:     Vec<f32>,
    pub labels:     Vec<f32>,
    pub batch_size: usize,
}
