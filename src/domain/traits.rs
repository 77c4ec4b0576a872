// ============================================================
// Layer 3 - Data Provider Contract
// ============================================================
// The training loop consumes video data only through these
// traits, so any source (in-memory, synthetic, a future frame
// reader) plugs in without touching the ML layer.
//
//   DataProvider - declares the sample shape and class count,
//                  and hands out the train / validation / test
//                  splits
//   VideoSplit   - one split: its size and a next_batch() that
//                  always returns a complete batch
//
// Traversal order is the provider's business; the training loop
// never reshuffles.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::batch::VideoBatchData;
use crate::domain::error::Result;

// ─── VideoSplit ───────────────────────────────────────────────────────────────
pub trait VideoSplit {
    /// Short name used in messages ("train", "validation", ...)
    fn name(&self) -> &str;

    /// Total number of examples in this split
    fn num_examples(&self) -> usize;

    /// The next `batch_size` examples. Implementations must never
    /// return a partially filled batch.
    fn next_batch(&mut self, batch_size: usize) -> Result<VideoBatchData>;
}

// ─── DataProvider ─────────────────────────────────────────────────────────────
pub trait DataProvider {
    /// Per-sample shape `[sequence_length, height, width, channels]`
    fn data_shape(&self) -> &[usize];

    /// Number of classes; labels are one-hot of this width
    fn n_classes(&self) -> usize;

    fn train(&mut self) -> &mut dyn VideoSplit;

    fn validation(&mut self) -> Option<&mut dyn VideoSplit>;

    fn test(&mut self) -> Option<&mut dyn VideoSplit> {
        None
    }
}
