// ============================================================
// Layer 3 - Domain Errors
// ============================================================
// The failure taxonomy of the network and its training loop.
//
//   Configuration     - invalid hyperparameters or training options,
//                       raised before any module is allocated
//   ShapeMismatch     - a batch that disagrees with the declared
//                       data shape or class count
//   EmptySplit        - a split too small to yield one full batch
//   CheckpointCorrupt - a checkpoint exists but cannot be restored
//
// A missing checkpoint is not an error: training starts from
// scratch instead.
//
// Upper layers carry these inside anyhow::Error and can recover
// the variant with downcast_ref::<DenseNetError>().
//
// Reference: Rust Book §9 (Error Handling), thiserror docs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DenseNetError {
    /// Invalid hyperparameter or training-option combination
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Batch data incompatible with the declared shapes
    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what:     &'static str,
        expected: Vec<usize>,
        actual:   Vec<usize>,
    },

    /// Not even one full batch can be drawn from the split
    #[error(
        "Split '{split}' has {num_examples} examples, fewer than one batch of {batch_size}"
    )]
    EmptySplit {
        split:        String,
        num_examples: usize,
        batch_size:   usize,
    },

    /// A checkpoint was found but could not be restored
    #[error("Checkpoint '{}' is corrupt: {reason}", path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, DenseNetError>;

impl DenseNetError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
