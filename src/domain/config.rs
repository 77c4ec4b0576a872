// ============================================================
// Layer 3 - Construction and Training Configuration
// ============================================================
// Two strongly-typed option sets, each validated eagerly:
//
//   NetworkConfig - everything needed to build the network and
//                   decide where its checkpoints and logs live
//   TrainParams   - everything the epoch loop needs
//
// Both are serialisable so they can be written next to the
// checkpoints they produced.

use serde::{Deserialize, Serialize};

use crate::domain::error::{DenseNetError, Result};
use crate::domain::hyperparams::HyperparameterSet;

// ─── NetworkConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub hyper:             HyperparameterSet,
    /// Dataset name, part of the model identifier
    pub dataset:           String,
    pub should_save_logs:  bool,
    pub should_save_model: bool,
    /// Wipe logs/<model_identifier> before this run
    pub renew_logs:        bool,
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(DenseNetError::config("dataset name must not be empty"));
        }
        if self.dataset.contains(['/', '\\']) {
            return Err(DenseNetError::config(format!(
                "dataset name '{}' must not contain path separators", self.dataset
            )));
        }
        self.hyper.validate()
    }
}

// ─── TrainParams ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub n_epochs:              usize,
    pub initial_learning_rate: f64,
    pub batch_size:            usize,
    pub reduce_lr_epoch_1:     usize,
    pub reduce_lr_epoch_2:     usize,
    /// Run an evaluation pass over the validation split each epoch
    pub validation_set:        bool,
}

impl TrainParams {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DenseNetError::config("batch_size must be positive, got 0"));
        }
        if !(self.initial_learning_rate > 0.0) || !self.initial_learning_rate.is_finite() {
            return Err(DenseNetError::config(format!(
                "initial_learning_rate must be a positive number, got {}",
                self.initial_learning_rate
            )));
        }
        if self.reduce_lr_epoch_1 > self.reduce_lr_epoch_2 {
            return Err(DenseNetError::config(format!(
                "reduce_lr_epoch_1 ({}) must not exceed reduce_lr_epoch_2 ({})",
                self.reduce_lr_epoch_1, self.reduce_lr_epoch_2
            )));
        }
        Ok(())
    }
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_epochs:              300,
            initial_learning_rate: 0.1,
            batch_size:            64,
            reduce_lr_epoch_1:     150,
            reduce_lr_epoch_2:     225,
            validation_set:        true,
        }
    }
}
