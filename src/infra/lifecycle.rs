// ============================================================
// Layer 6 - Model Identity and Paths
// ============================================================
// Every trained network gets a deterministic identifier derived
// from its hyperparameters and dataset name. Checkpoints and logs
// live under directories named after it:
//
//   <root>/saves/<model_identifier>/            checkpoints, config
//   <root>/saves/<model_identifier>/model.chkpt checkpoint prefix
//   <root>/logs/<model_identifier>/             scalar logs
//
// Identifier layout:
//   {model_type}_growth_rate={g}_depth={d}_dataset_{name}_total_block={t}_h{hash}
//
// The readable prefix alone collides for networks that differ only
// in keep_prob, weight_decay, momentum or reduction; `hash` is the
// first 12 hex digits of the SHA-256 of the JSON-serialised
// hyperparameter set, which separates them.
//
// Reference: Rust Book §12 (I/O and File Handling), sha2 docs

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::domain::config::NetworkConfig;
use crate::domain::hyperparams::HyperparameterSet;

const HASH_DIGITS: usize = 12;

/// First 12 hex digits of SHA-256 over the serialised hyperparameters
pub fn hyperparameter_hash(hyper: &HyperparameterSet) -> Result<String> {
    let canonical = serde_json::to_string(hyper).context("Cannot serialise hyperparameters")?;
    let digest = format!("{:x}", Sha256::digest(canonical.as_bytes()));
    Ok(digest[..HASH_DIGITS].to_string())
}

pub fn model_identifier(hyper: &HyperparameterSet, dataset: &str) -> Result<String> {
    Ok(format!(
        "{}_growth_rate={}_depth={}_dataset_{}_total_block={}_h{}",
        hyper.model_type,
        hyper.growth_rate,
        hyper.depth,
        dataset,
        hyper.total_blocks,
        hyperparameter_hash(hyper)?,
    ))
}

// ─── ModelPaths ───────────────────────────────────────────────────────────────
/// Paths computed once at construction; directories exist afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub model_identifier: String,
    pub save_path:        PathBuf,
    pub model_path:       PathBuf,
    pub logs_path:        PathBuf,
}

impl ModelPaths {
    /// Create the save and log directories under `root`. With
    /// `renew_logs` the log directory is wiped and recreated.
    pub fn new(root: &Path, config: &NetworkConfig) -> Result<Self> {
        let paths = Self::resolve(root, config)?;

        fs::create_dir_all(&paths.save_path).with_context(|| {
            format!("Cannot create save directory '{}'", paths.save_path.display())
        })?;

        if config.renew_logs && paths.logs_path.exists() {
            fs::remove_dir_all(&paths.logs_path).with_context(|| {
                format!("Cannot remove log directory '{}'", paths.logs_path.display())
            })?;
            tracing::info!("Renewed logs at '{}'", paths.logs_path.display());
        }
        fs::create_dir_all(&paths.logs_path).with_context(|| {
            format!("Cannot create log directory '{}'", paths.logs_path.display())
        })?;

        Ok(paths)
    }

    /// Compute the paths without touching the filesystem
    pub fn resolve(root: &Path, config: &NetworkConfig) -> Result<Self> {
        let model_identifier = model_identifier(&config.hyper, &config.dataset)?;
        let save_path  = root.join("saves").join(&model_identifier);
        let model_path = save_path.join("model.chkpt");
        let logs_path  = root.join("logs").join(&model_identifier);
        Ok(Self { model_identifier, save_path, model_path, logs_path })
    }
}
