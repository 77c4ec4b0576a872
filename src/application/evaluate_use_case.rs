// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Restores the latest checkpoint of a trained network and runs
// one evaluation pass over the validation or test split.
//
//   Step 1: Rebuild the data provider and model config
//   Step 2: Find the checkpoint under saves/<model_identifier>
//   Step 3: Load the model record (no autodiff, no optimizer)
//   Step 4: Evaluate in Mode::Eval
//
// A missing checkpoint is an error here.

use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};

use crate::backend::{default_device, DefaultBackend};
use crate::data::batcher::VideoBatcher;
use crate::data::synthetic::SyntheticConfig;
use crate::domain::config::NetworkConfig;
use crate::domain::traits::DataProvider;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::lifecycle::ModelPaths;
use crate::infra::metrics::EpochMetrics;
use crate::ml::model::DenseNet3dConfig;
use crate::ml::trainer::evaluate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalSplit {
    Validation,
    Test,
}

impl fmt::Display for EvalSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalSplit::Validation => f.write_str("validation"),
            EvalSplit::Test       => f.write_str("test"),
        }
    }
}

impl FromStr for EvalSplit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "validation" | "valid" => Ok(EvalSplit::Validation),
            "test"                 => Ok(EvalSplit::Test),
            other => Err(format!("unknown split '{other}', expected 'validation' or 'test'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub network:    NetworkConfig,
    pub data:       SyntheticConfig,
    pub root_dir:   PathBuf,
    pub split:      EvalSplit,
    pub batch_size: usize,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EpochMetrics> {
        let cfg = &self.config;
        cfg.network.validate()?;

        // ── Step 1: Data and config ───────────────────────────────────────────
        let mut provider = cfg
            .data
            .build()
            .context("Failed to build the synthetic dataset")?;
        let model_config = DenseNet3dConfig::new(
            cfg.network.hyper.clone(),
            provider.data_shape().to_vec(),
            provider.n_classes(),
        );

        // ── Step 2: Checkpoint ────────────────────────────────────────────────
        let paths   = ModelPaths::resolve(&cfg.root_dir, &cfg.network)?;
        let manager = CheckpointManager::new(&paths);
        let Some(state) = manager.latest()? else {
            bail!(
                "No checkpoint found in '{}'; train the model first",
                paths.save_path.display()
            );
        };
        manager.check_config(&model_config)?;

        // ── Step 3: Model ─────────────────────────────────────────────────────
        let device = default_device();
        let model  = model_config.init::<DefaultBackend>(&device)?;
        let model  = manager.load_model(&state, model, &device)?;
        tracing::info!("Evaluating checkpoint '{}' (epoch {})", state.model_checkpoint_path, state.epoch);

        // ── Step 4: Evaluate ──────────────────────────────────────────────────
        let batcher = VideoBatcher::<DefaultBackend>::new(device, &model_config.data_shape, model_config.n_classes)?;
        let split = match cfg.split {
            EvalSplit::Validation => provider.validation(),
            EvalSplit::Test       => provider.test(),
        }
        .with_context(|| format!("The dataset has no {} split", cfg.split))?;

        let metrics = evaluate(&model, &batcher, split, cfg.batch_size)?;
        println!(
            "{}: mean cross_entropy: {:.6}, mean accuracy: {:.6}",
            cfg.split, metrics.loss, metrics.accuracy
        );
        Ok(metrics)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainUseCase};
    use crate::domain::config::TrainParams;
    use crate::domain::hyperparams::HyperparameterSet;
    use tempfile::TempDir;

    fn network() -> NetworkConfig {
        NetworkConfig {
            hyper: HyperparameterSet {
                growth_rate:  2,
                depth:        4,
                total_blocks: 1,
                ..HyperparameterSet::default()
            },
            dataset:           "synthetic".to_string(),
            should_save_logs:  false,
            should_save_model: true,
            renew_logs:        false,
        }
    }

    fn data() -> SyntheticConfig {
        SyntheticConfig {
            n_classes:      2,
            data_shape:     vec![2, 4, 4, 1],
            train_examples: 4,
            valid_examples: 2,
            test_examples:  4,
            seed:           9,
        }
    }

    fn eval_config(root: &TempDir, split: EvalSplit) -> EvaluateConfig {
        EvaluateConfig {
            network:    network(),
            data:       data(),
            root_dir:   root.path().to_path_buf(),
            split,
            batch_size: 2,
        }
    }

    #[test]
    fn test_split_names_parse() {
        assert_eq!("valid".parse::<EvalSplit>().unwrap(), EvalSplit::Validation);
        assert_eq!("test".parse::<EvalSplit>().unwrap(), EvalSplit::Test);
        assert!("train".parse::<EvalSplit>().is_err());
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(EvaluateUseCase::new(eval_config(&root, EvalSplit::Test)).execute().is_err());
    }

    #[test]
    fn test_evaluates_trained_checkpoint() {
        let root = TempDir::new().unwrap();
        TrainUseCase::new(TrainConfig {
            network:  network(),
            params:   TrainParams {
                n_epochs:       1,
                batch_size:     2,
                validation_set: false,
                ..TrainParams::default()
            },
            data:     data(),
            root_dir: root.path().to_path_buf(),
        })
        .execute()
        .unwrap();

        for split in [EvalSplit::Validation, EvalSplit::Test] {
            let metrics = EvaluateUseCase::new(eval_config(&root, split)).execute().unwrap();
            assert!(metrics.loss.is_finite());
            assert!((0.0..=1.0).contains(&metrics.accuracy));
        }
    }
}
