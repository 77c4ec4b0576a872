// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `evaluate` and `inspect`.
// Network and data flags are shared through flattened Args
// structs so every command builds the same model identifier
// from the same flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::{EvalSplit, EvaluateConfig};
use crate::application::inspect_use_case::InspectConfig;
use crate::application::train_use_case::TrainConfig;
use crate::data::synthetic::SyntheticConfig;
use crate::domain::config::{NetworkConfig, TrainParams};
use crate::domain::hyperparams::{HyperparameterSet, ModelType};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a 3D DenseNet on synthetic video clips
    Train(TrainArgs),

    /// Score the latest checkpoint on the validation or test split
    Evaluate(EvaluateArgs),

    /// Print the layer plan and parameter count
    Inspect(InspectArgs),
}

// ─── Shared Args ──────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// Channels each internal layer adds
    #[arg(long, default_value_t = 12)]
    pub growth_rate: usize,

    /// Total layer count, including the initial convolution
    #[arg(long, default_value_t = 40)]
    pub depth: usize,

    #[arg(long, default_value_t = 3)]
    pub total_blocks: usize,

    /// Dropout keep probability; 1.0 disables dropout
    #[arg(long, default_value_t = 0.8)]
    pub keep_prob: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 0.9)]
    pub nesterov_momentum: f64,

    /// DenseNet or DenseNet-BC
    #[arg(long, default_value = "DenseNet")]
    pub model_type: ModelType,

    /// Compression at transition layers [default: 1.0 for DenseNet, 0.5 for DenseNet-BC]
    #[arg(long)]
    pub reduction: Option<f64>,

    /// Dataset name, part of the model identifier
    #[arg(long, default_value = "synthetic")]
    pub dataset: String,

    /// Don't write scalars.csv
    #[arg(long)]
    pub no_logs: bool,

    /// Don't write checkpoints
    #[arg(long)]
    pub no_save: bool,

    /// Wipe existing logs for this model first
    #[arg(long)]
    pub renew_logs: bool,
}

impl From<NetworkArgs> for NetworkConfig {
    fn from(a: NetworkArgs) -> Self {
        NetworkConfig {
            hyper: HyperparameterSet {
                growth_rate:       a.growth_rate,
                depth:             a.depth,
                total_blocks:      a.total_blocks,
                keep_prob:         a.keep_prob,
                weight_decay:      a.weight_decay,
                nesterov_momentum: a.nesterov_momentum,
                model_type:        a.model_type,
                reduction:         a.reduction.unwrap_or_else(|| a.model_type.default_reduction()),
                bc_mode:           a.model_type.uses_bottleneck(),
            },
            dataset:           a.dataset,
            should_save_logs:  !a.no_logs,
            should_save_model: !a.no_save,
            renew_logs:        a.renew_logs,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    #[arg(long, default_value_t = 2)]
    pub n_classes: usize,

    /// Clip shape as seq_len,height,width,channels
    #[arg(long, value_delimiter = ',', default_value = "8,32,32,3")]
    pub data_shape: Vec<usize>,

    #[arg(long, default_value_t = 64)]
    pub train_examples: usize,

    #[arg(long, default_value_t = 16)]
    pub valid_examples: usize,

    #[arg(long, default_value_t = 16)]
    pub test_examples: usize,

    /// Seed for the synthetic clips and epoch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory holding saves/ and logs/
    #[arg(long, default_value = ".")]
    pub root_dir: PathBuf,
}

impl From<&DataArgs> for SyntheticConfig {
    fn from(a: &DataArgs) -> Self {
        SyntheticConfig {
            n_classes:      a.n_classes,
            data_shape:     a.data_shape.clone(),
            train_examples: a.train_examples,
            valid_examples: a.valid_examples,
            test_examples:  a.test_examples,
            seed:           a.seed,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value_t = 300)]
    pub n_epochs: usize,

    #[arg(long, default_value_t = 0.1)]
    pub initial_learning_rate: f64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Epoch at which the learning rate drops 10x
    #[arg(long, default_value_t = 150)]
    pub reduce_lr_epoch_1: usize,

    /// Epoch at which the learning rate drops 100x
    #[arg(long, default_value_t = 225)]
    pub reduce_lr_epoch_2: usize,

    /// Skip the per-epoch validation pass
    #[arg(long)]
    pub no_validation: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data:     SyntheticConfig::from(&a.data),
            root_dir: a.data.root_dir,
            network:  a.network.into(),
            params:   TrainParams {
                n_epochs:              a.n_epochs,
                initial_learning_rate: a.initial_learning_rate,
                batch_size:            a.batch_size,
                reduce_lr_epoch_1:     a.reduce_lr_epoch_1,
                reduce_lr_epoch_2:     a.reduce_lr_epoch_2,
                validation_set:        !a.no_validation,
            },
        }
    }
}

// ─── evaluate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub data: DataArgs,

    /// validation or test
    #[arg(long, default_value = "test")]
    pub split: EvalSplit,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            data:       SyntheticConfig::from(&a.data),
            root_dir:   a.data.root_dir,
            network:    a.network.into(),
            split:      a.split,
            batch_size: a.batch_size,
        }
    }
}

// ─── inspect ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[arg(long, default_value_t = 2)]
    pub n_classes: usize,

    /// Clip shape as seq_len,height,width,channels
    #[arg(long, value_delimiter = ',', default_value = "8,32,32,3")]
    pub data_shape: Vec<usize>,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig {
            network:    a.network.into(),
            data_shape: a.data_shape,
            n_classes:  a.n_classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_bc_model_type_sets_bottleneck_and_reduction() {
        let cli = Cli::try_parse_from([
            "densenet3d", "inspect", "--model-type", "DenseNet-BC", "--data-shape", "4,16,16,1",
        ])
        .unwrap();
        let Commands::Inspect(args) = cli.command else { panic!("expected inspect") };
        let config = InspectConfig::from(args);

        assert!(config.network.hyper.bc_mode);
        assert_eq!(config.network.hyper.reduction, 0.5);
        assert_eq!(config.data_shape, vec![4, 16, 16, 1]);
    }

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "densenet3d", "train", "--n-epochs", "5", "--batch-size", "8",
            "--reduction", "0.7", "--no-validation", "--no-save", "--root-dir", "/tmp/runs",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let config = TrainConfig::from(args);

        assert_eq!(config.params.n_epochs, 5);
        assert_eq!(config.params.batch_size, 8);
        assert!(!config.params.validation_set);
        assert!(!config.network.should_save_model);
        assert!(config.network.should_save_logs);
        assert_eq!(config.network.hyper.reduction, 0.7);
        assert!(!config.network.hyper.bc_mode);
        assert_eq!(config.root_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.data.data_shape, vec![8, 32, 32, 3]);
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        assert!(Cli::try_parse_from(["densenet3d", "inspect", "--model-type", "ResNet"]).is_err());
    }
}
