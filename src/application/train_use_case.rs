// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Validate configs            (Layer 3 - domain)
//   Step 2: Build the data provider     (Layer 4 - data)
//   Step 3: Plan and describe the net   (Layer 5 - ml)
//   Step 4: Resolve save/log paths      (Layer 6 - infra)
//   Step 5: Build model and optimizer   (Layer 5 - ml)
//   Step 6: Run the epoch loop          (Layer 5 - ml)
//   Step 7: Evaluate the test split     (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{backend_name, default_device, TrainingBackend};
use crate::data::synthetic::SyntheticConfig;
use crate::domain::config::{NetworkConfig, TrainParams};
use crate::domain::traits::DataProvider;
use crate::infra::lifecycle::ModelPaths;
use crate::infra::metrics::EpochMetrics;
use crate::ml::model::DenseNet3dConfig;
use crate::ml::trainer::{nesterov_sgd, DenseNetTrainer, TrainingContext};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one run needs. Serialisable so a run can be described
// in JSON and replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub network:  NetworkConfig,
    pub params:   TrainParams,
    pub data:     SyntheticConfig,
    /// Parent of the saves/ and logs/ directories
    pub root_dir: PathBuf,
}

/// Final numbers of a finished run
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub model_identifier: String,
    pub batches_step:     usize,
    pub test:             Option<EpochMetrics>,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.network.validate()?;
        cfg.params.validate()?;

        // ── Step 2: Synthetic data ────────────────────────────────────────────
        let mut provider = cfg
            .data
            .build()
            .context("Failed to build the synthetic dataset")?;
        tracing::info!(
            "Dataset '{}': {} train examples, data shape {:?}, {} classes",
            cfg.network.dataset,
            provider.train().num_examples(),
            provider.data_shape(),
            provider.n_classes(),
        );

        // ── Step 3: Plan the network ──────────────────────────────────────────
        let model_config = DenseNet3dConfig::new(
            cfg.network.hyper.clone(),
            provider.data_shape().to_vec(),
            provider.n_classes(),
        );
        let plan = model_config.plan()?;
        println!("{}", cfg.network.hyper.describe());
        println!("Total training params: {:.1}M", plan.trainable_params() as f64 / 1e6);

        // ── Step 4: Paths ─────────────────────────────────────────────────────
        let paths = ModelPaths::new(&cfg.root_dir, &cfg.network)?;
        tracing::info!("Model identifier: {}", paths.model_identifier);

        // ── Step 5: Model and optimizer ───────────────────────────────────────
        tracing::info!("Backend: {}", backend_name());
        let device = default_device();
        let model  = model_config.init::<TrainingBackend>(&device)?;
        let optim  = nesterov_sgd::<TrainingBackend>(&cfg.network.hyper);
        let ctx    = TrainingContext::new(model, optim, device, &cfg.network.hyper);

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let trainer = DenseNetTrainer::new(ctx, model_config, &cfg.network, &paths)?
            .train_all_epochs(&mut provider, &cfg.params)?;

        // ── Step 7: Test split ────────────────────────────────────────────────
        let test = match provider.test() {
            Some(split) => {
                let metrics = trainer.test(split, cfg.params.batch_size)?;
                println!(
                    "Test: mean cross_entropy: {:.6}, mean accuracy: {:.6}",
                    metrics.loss, metrics.accuracy
                );
                Some(metrics)
            }
            None => None,
        };

        Ok(TrainReport {
            model_identifier: paths.model_identifier,
            batches_step:     trainer.batches_step(),
            test,
        })
    }
}
