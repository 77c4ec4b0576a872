// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores the trainable state of a network using
// Burn's NamedMpkGzFileRecorder at full precision.
//
// What gets saved per epoch:
//   1. Model record     - every parameter plus batch-norm running
//                         statistics
//   2. Optimizer record - Nesterov momentum buffers
//   3. checkpoint.json  - which checkpoint is the latest, its epoch,
//                         the global batch counter, and every
//                         checkpoint written so far
//   4. config.json      - the DenseNet3dConfig the records belong to
//
// File naming convention:
//   saves/<model_identifier>/
//     model.chkpt-1.mpk.gz         ← model after epoch 1
//     model.chkpt-1-optim.mpk.gz   ← optimizer after epoch 1
//     ...
//     checkpoint.json
//     config.json
//
// The recorder replaces the last extension of the path it is
// given, so record paths carry a throwaway `.params` extension.
//
// checkpoint.json is written to a temporary file and renamed
// into place, so it never names a half-written checkpoint.
// A missing checkpoint.json means "start from scratch"; one that
// exists but cannot be read or loaded is CheckpointCorrupt.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DenseNetError;
use crate::infra::lifecycle::ModelPaths;
use crate::ml::model::{DenseNet3d, DenseNet3dConfig};

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

const STATE_FILE:  &str = "checkpoint.json";
const CONFIG_FILE: &str = "config.json";

/// Contents of checkpoint.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Name of the latest checkpoint, e.g. "model.chkpt-12"
    pub model_checkpoint_path:      String,
    pub epoch:                      usize,
    /// Global batch counter at save time
    pub batches_step:               usize,
    pub saved_at:                   DateTime<Utc>,
    /// Every checkpoint written so far, oldest first
    pub all_model_checkpoint_paths: Vec<String>,
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> anyhow::Error {
    DenseNetError::CheckpointCorrupt {
        path:   path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

/// Write `contents` next to `path` and rename it into place
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

pub struct CheckpointManager {
    /// saves/<model_identifier>
    dir:    PathBuf,
    /// Checkpoint name prefix, "model.chkpt"
    prefix: String,
}

impl CheckpointManager {
    pub fn new(paths: &ModelPaths) -> Self {
        let prefix = paths
            .model_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model.chkpt".to_string());
        Self { dir: paths.save_path.clone(), prefix }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_name(&self, epoch: usize) -> String {
        format!("{}-{epoch}", self.prefix)
    }

    fn model_file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.params"))
    }

    fn optim_file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}-optim.params"))
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    // ─── Save ─────────────────────────────────────────────────────────────────

    /// Persist model and optimizer for `epoch`, then point
    /// checkpoint.json at them.
    pub fn save<B, O>(
        &self,
        model:        &DenseNet3d<B>,
        optim:        &O,
        epoch:        usize,
        batches_step: usize,
    ) -> Result<CheckpointState>
    where
        B: AutodiffBackend,
        O: Optimizer<DenseNet3d<B>, B>,
    {
        let name     = self.checkpoint_name(epoch);
        let recorder = CheckpointRecorder::default();

        let model_file = self.model_file(&name);
        Recorder::<B>::record(&recorder, model.clone().into_record(), model_file.clone())
            .with_context(|| format!("Failed to save model to '{}'", model_file.display()))?;

        let optim_file = self.optim_file(&name);
        Recorder::<B>::record(&recorder, optim.to_record(), optim_file.clone())
            .with_context(|| format!("Failed to save optimizer to '{}'", optim_file.display()))?;

        // An unreadable previous state only loses the history list
        let mut all = match self.latest() {
            Ok(Some(previous)) => previous.all_model_checkpoint_paths,
            Ok(None)           => Vec::new(),
            Err(e) => {
                tracing::warn!("Replacing unreadable checkpoint state: {e}");
                Vec::new()
            }
        };
        all.retain(|n| n != &name);
        all.push(name.clone());

        let state = CheckpointState {
            model_checkpoint_path:      name,
            epoch,
            batches_step,
            saved_at:                   Utc::now(),
            all_model_checkpoint_paths: all,
        };
        write_atomic(&self.state_path(), &serde_json::to_string_pretty(&state)?)?;

        tracing::debug!("Saved checkpoint '{}'", state.model_checkpoint_path);
        Ok(state)
    }

    pub fn save_config(&self, config: &DenseNet3dConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&path, &json)?;
        tracing::debug!("Saved network config to '{}'", path.display());
        Ok(())
    }

    // ─── Load ─────────────────────────────────────────────────────────────────

    /// The latest checkpoint, or None when nothing was saved yet
    pub fn latest(&self) -> Result<Option<CheckpointState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let json  = fs::read_to_string(&path).map_err(|e| corrupt(&path, e))?;
        let state = serde_json::from_str(&json).map_err(|e| corrupt(&path, e))?;
        Ok(Some(state))
    }

    /// Fail if the checkpoints here were written for a different
    /// network configuration than `config`.
    pub fn check_config(&self, config: &DenseNet3dConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(());
        }
        let json = fs::read_to_string(&path).map_err(|e| corrupt(&path, e))?;
        let saved: serde_json::Value = serde_json::from_str(&json).map_err(|e| corrupt(&path, e))?;
        if saved != serde_json::to_value(config)? {
            return Err(corrupt(
                &path,
                "checkpoints were saved for a different data shape or class count",
            ));
        }
        Ok(())
    }

    pub fn load_model<B: Backend>(
        &self,
        state:  &CheckpointState,
        model:  DenseNet3d<B>,
        device: &B::Device,
    ) -> Result<DenseNet3d<B>> {
        let path = self.model_file(&state.model_checkpoint_path);
        let record = Recorder::<B>::load(&CheckpointRecorder::default(), path.clone(), device)
            .map_err(|e| corrupt(&path, e))?;
        Ok(model.load_record(record))
    }

    /// Restore model and optimizer from `state`
    pub fn restore<B, O>(
        &self,
        state:  &CheckpointState,
        model:  DenseNet3d<B>,
        optim:  O,
        device: &B::Device,
    ) -> Result<(DenseNet3d<B>, O)>
    where
        B: AutodiffBackend,
        O: Optimizer<DenseNet3d<B>, B>,
    {
        let model = self.load_model(state, model, device)?;

        let path = self.optim_file(&state.model_checkpoint_path);
        let record: O::Record = Recorder::<B>::load(&CheckpointRecorder::default(), path.clone(), device)
            .map_err(|e| corrupt(&path, e))?;

        tracing::info!("Restored checkpoint '{}'", state.model_checkpoint_path);
        Ok((model, optim.load_record(record)))
    }
}
