// ============================================================
// Layer 3 - Hyperparameter Set
// ============================================================
// The immutable numbers that fully determine the network's
// topology. Nothing here touches tensors; the ML layer reads
// these values to size every module.
//
//   layers_per_block      = (depth - (total_blocks + 1)) / total_blocks
//                           halved again in bottleneck (BC) mode,
//                           where each layer is two convolutions
//   first_output_features = 2 * growth_rate
//
// Reference: Huang et al. (2017) Densely Connected Convolutional
//            Networks, §3 (Growth rate, Bottleneck, Compression)

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::{DenseNetError, Result};

// ─── ModelType ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "DenseNet")]
    DenseNet,
    #[serde(rename = "DenseNet-BC")]
    DenseNetBc,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::DenseNet   => "DenseNet",
            ModelType::DenseNetBc => "DenseNet-BC",
        }
    }

    /// DenseNet-BC is the only variant with bottleneck layers
    pub fn uses_bottleneck(&self) -> bool {
        matches!(self, ModelType::DenseNetBc)
    }

    /// Compression used at transition layers when none is given:
    /// plain DenseNet keeps every channel, DenseNet-BC halves them.
    pub fn default_reduction(&self) -> f64 {
        match self {
            ModelType::DenseNet   => 1.0,
            ModelType::DenseNetBc => 0.5,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = DenseNetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DenseNet"    => Ok(ModelType::DenseNet),
            "DenseNet-BC" => Ok(ModelType::DenseNetBc),
            other => Err(DenseNetError::config(format!(
                "unknown model type '{other}' (expected 'DenseNet' or 'DenseNet-BC')"
            ))),
        }
    }
}

// ─── HyperparameterSet ────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSet {
    pub growth_rate:       usize,
    pub depth:             usize,
    pub total_blocks:      usize,
    pub keep_prob:         f64,
    pub weight_decay:      f64,
    pub nesterov_momentum: f64,
    pub model_type:        ModelType,
    pub reduction:         f64,
    pub bc_mode:           bool,
}

impl HyperparameterSet {
    /// Check every constraint and return an error naming the
    /// offending values. Must pass before any module is built.
    pub fn validate(&self) -> Result<()> {
        if self.growth_rate == 0 {
            return Err(DenseNetError::config("growth_rate must be positive, got 0"));
        }
        if self.total_blocks == 0 {
            return Err(DenseNetError::config("total_blocks must be positive, got 0"));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(DenseNetError::config(format!(
                "keep_prob must lie in (0, 1], got {}", self.keep_prob
            )));
        }
        if !(self.reduction > 0.0 && self.reduction <= 1.0) {
            return Err(DenseNetError::config(format!(
                "reduction must lie in (0, 1], got {}", self.reduction
            )));
        }
        if !(self.weight_decay >= 0.0) {
            return Err(DenseNetError::config(format!(
                "weight_decay must be non-negative, got {}", self.weight_decay
            )));
        }
        if !self.nesterov_momentum.is_finite() || self.nesterov_momentum < 0.0 {
            return Err(DenseNetError::config(format!(
                "nesterov_momentum must be a non-negative number, got {}",
                self.nesterov_momentum
            )));
        }
        if self.model_type.uses_bottleneck() != self.bc_mode {
            return Err(DenseNetError::config(format!(
                "model_type {} does not match bc_mode={}",
                self.model_type, self.bc_mode
            )));
        }

        let non_stem = self.depth.checked_sub(self.total_blocks + 1).ok_or_else(|| {
            DenseNetError::config(format!(
                "depth {} is too small for {} blocks (needs at least {})",
                self.depth, self.total_blocks, self.total_blocks + 1
            ))
        })?;
        if self.layers_per_block() == 0 {
            return Err(DenseNetError::config(format!(
                "depth {} with {} blocks (bc_mode={}) leaves {} layers per block; \
                 at least one is required",
                self.depth, self.total_blocks, self.bc_mode,
                non_stem / self.total_blocks,
            )));
        }
        Ok(())
    }

    /// Internal layers in every dense block. Zero for an invalid set.
    pub fn layers_per_block(&self) -> usize {
        if self.total_blocks == 0 {
            return 0;
        }
        let layers = self.depth.saturating_sub(self.total_blocks + 1) / self.total_blocks;
        if self.bc_mode { layers / 2 } else { layers }
    }

    /// Channels produced by the initial convolution
    pub fn first_output_features(&self) -> usize {
        self.growth_rate * 2
    }

    /// Human-readable summary printed when the network is built
    pub fn describe(&self) -> String {
        let layers = self.layers_per_block();
        let body = if self.bc_mode {
            format!(
                "Build {} model with {} blocks, {} bottleneck layers and {} composite layers each.",
                self.model_type, self.total_blocks, layers, layers
            )
        } else {
            format!(
                "Build {} model with {} blocks, {} composite layers each.",
                self.model_type, self.total_blocks, layers
            )
        };
        format!("{body}\nReduction at transition layers: {:.1}", self.reduction)
    }
}

impl Default for HyperparameterSet {
    fn default() -> Self {
        Self {
            growth_rate:       12,
            depth:             40,
            total_blocks:      3,
            keep_prob:         0.8,
            weight_decay:      1e-4,
            nesterov_momentum: 0.9,
            model_type:        ModelType::DenseNet,
            reduction:         1.0,
            bc_mode:           false,
        }
    }
}
