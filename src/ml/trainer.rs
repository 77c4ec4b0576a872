// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Epoch loop with Nesterov-momentum SGD, a staged learning-rate
// schedule, per-epoch validation and checkpoint/resume.
//
// Key Burn 0.20 insight:
//   - Training runs on an AutodiffBackend (Autodiff<NdArray> or
//     Autodiff<Wgpu>) so loss.backward() yields gradients
//   - model.valid() returns the model on the inner backend;
//     evaluation runs there with Mode::Eval, so batch norm uses
//     running statistics and dropout is off
//   - the optimizer consumes the model and returns the updated
//     one, so TrainingContext owns both
//
// Resume protocol:
//   load_model() → 1 when nothing was saved, else saved_epoch + 1.
//   Model, optimizer state and the global batch counter all come
//   back, so a resumed run continues exactly where it stopped.
//
// Reference: Burn Book §5, Sutskever et al. (2013) On the
//            importance of initialization and momentum in deep
//            learning

use std::time::Instant;

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::data::batcher::{VideoBatch, VideoBatcher};
use crate::domain::config::{NetworkConfig, TrainParams};
use crate::domain::error::DenseNetError;
use crate::domain::hyperparams::HyperparameterSet;
use crate::domain::traits::{DataProvider, VideoSplit};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::lifecycle::ModelPaths;
use crate::infra::metrics::{EpochMetrics, MetricAccumulator, ScalarLogger};
use crate::infra::timing::{estimate_remaining, format_duration};
use crate::ml::layers::Mode;
use crate::ml::model::{DenseNet3d, DenseNet3dConfig};
use crate::ml::schedule::StagedSchedule;

/// SGD with Nesterov momentum and no dampening. Weight decay is
/// part of the objective, not of the optimizer.
pub fn nesterov_sgd<B: AutodiffBackend>(hyper: &HyperparameterSet) -> impl Optimizer<DenseNet3d<B>, B> {
    let momentum = MomentumConfig::new()
        .with_momentum(hyper.nesterov_momentum)
        .with_dampening(0.0)
        .with_nesterov(true);
    SgdConfig::new()
        .with_momentum(Some(momentum))
        .init::<B, DenseNet3d<B>>()
}

fn empty_split(split: &dyn VideoSplit, batch_size: usize) -> DenseNetError {
    DenseNetError::EmptySplit {
        split:        split.name().to_string(),
        num_examples: split.num_examples(),
        batch_size,
    }
}

// ─── TrainingContext ──────────────────────────────────────────────────────────
/// Owns everything one optimisation step touches
pub struct TrainingContext<B: AutodiffBackend, O> {
    pub device:   B::Device,
    model:        DenseNet3d<B>,
    optim:        O,
    weight_decay: f64,
    batches_step: usize,
}

impl<B, O> TrainingContext<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<DenseNet3d<B>, B>,
{
    pub fn new(model: DenseNet3d<B>, optim: O, device: B::Device, hyper: &HyperparameterSet) -> Self {
        Self {
            device,
            model,
            optim,
            weight_decay: hyper.weight_decay,
            batches_step: 0,
        }
    }

    pub fn model(&self) -> &DenseNet3d<B> {
        &self.model
    }

    /// Batches trained so far, across resumes
    pub fn batches_step(&self) -> usize {
        self.batches_step
    }

    /// One gradient step; returns the batch's cross-entropy and accuracy
    pub fn train_step(&mut self, batch: VideoBatch<B>, learning_rate: f64) -> (f64, f64) {
        let output = self
            .model
            .forward_classification(batch.videos, batch.labels, Mode::Train);

        let objective = if self.weight_decay > 0.0 {
            output.loss.clone() + self.model.l2_loss().mul_scalar(self.weight_decay)
        } else {
            output.loss.clone()
        };

        let grads = objective.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(learning_rate, self.model.clone(), grads);
        self.batches_step += 1;

        (
            output.loss.into_scalar().elem::<f64>(),
            output.accuracy.into_scalar().elem::<f64>(),
        )
    }

    pub fn save(&self, manager: &CheckpointManager, epoch: usize) -> Result<()> {
        manager.save(&self.model, &self.optim, epoch, self.batches_step)?;
        Ok(())
    }

    /// Restore the latest checkpoint if there is one. Returns the
    /// epoch to start training from.
    pub fn restore(mut self, manager: &CheckpointManager) -> Result<(Self, usize)> {
        let Some(state) = manager.latest()? else {
            println!("Training from scratch");
            return Ok((self, 1));
        };

        let (model, optim) = manager.restore(&state, self.model, self.optim, &self.device)?;
        self.model        = model;
        self.optim        = optim;
        self.batches_step = state.batches_step;

        println!("Successfully load model from save path: {}", manager.dir().display());
        Ok((self, state.epoch + 1))
    }
}

/// One evaluation pass over every full batch of `split`
pub fn evaluate<B: Backend>(
    model:      &DenseNet3d<B>,
    batcher:    &VideoBatcher<B>,
    split:      &mut dyn VideoSplit,
    batch_size: usize,
) -> Result<EpochMetrics> {
    let n_batches = split.num_examples() / batch_size.max(1);
    let mut acc = MetricAccumulator::new();
    for _ in 0..n_batches {
        let batch  = batcher.batch(split.next_batch(batch_size)?)?;
        let output = model.forward_classification(batch.videos, batch.labels, Mode::Eval);
        acc.push(
            output.loss.into_scalar().elem::<f64>(),
            output.accuracy.into_scalar().elem::<f64>(),
        );
    }
    Ok(acc.mean().ok_or_else(|| empty_split(&*split, batch_size))?)
}

// ─── DenseNetTrainer ──────────────────────────────────────────────────────────
pub struct DenseNetTrainer<B: AutodiffBackend, O> {
    ctx:               TrainingContext<B, O>,
    batcher:           VideoBatcher<B>,
    eval_batcher:      VideoBatcher<B::InnerBackend>,
    checkpoints:       CheckpointManager,
    scalars:           Option<ScalarLogger>,
    should_save_model: bool,
    model_config:      DenseNet3dConfig,
}

impl<B, O> DenseNetTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<DenseNet3d<B>, B>,
{
    pub fn new(
        ctx:          TrainingContext<B, O>,
        model_config: DenseNet3dConfig,
        network:      &NetworkConfig,
        paths:        &ModelPaths,
    ) -> Result<Self> {
        let batcher = VideoBatcher::new(ctx.device.clone(), &model_config.data_shape, model_config.n_classes)?;
        let eval_batcher =
            VideoBatcher::new(ctx.device.clone(), &model_config.data_shape, model_config.n_classes)?;
        let scalars = if network.should_save_logs {
            Some(ScalarLogger::new(&paths.logs_path)?)
        } else {
            None
        };

        let checkpoints = CheckpointManager::new(paths);
        checkpoints.check_config(&model_config)?;

        Ok(Self {
            ctx,
            batcher,
            eval_batcher,
            checkpoints,
            scalars,
            should_save_model: network.should_save_model,
            model_config,
        })
    }

    pub fn model(&self) -> &DenseNet3d<B> {
        self.ctx.model()
    }

    pub fn batches_step(&self) -> usize {
        self.ctx.batches_step()
    }

    /// Restore the latest checkpoint; returns the first epoch left to train
    pub fn load_model(mut self) -> Result<(Self, usize)> {
        let (ctx, start_epoch) = self.ctx.restore(&self.checkpoints)?;
        self.ctx = ctx;
        Ok((self, start_epoch))
    }

    pub fn save_model(&self, epoch: usize) -> Result<()> {
        self.checkpoints.save_config(&self.model_config)?;
        self.ctx.save(&self.checkpoints, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
        Ok(())
    }

    pub fn train_all_epochs(self, provider: &mut dyn DataProvider, params: &TrainParams) -> Result<Self> {
        params.validate()?;
        let schedule = StagedSchedule::from_params(params);
        let total_start = Instant::now();

        let (mut this, start_epoch) = self.load_model()?;
        if start_epoch > params.n_epochs {
            tracing::info!(
                "Checkpoint already covers {} of {} epochs, nothing to train",
                start_epoch - 1, params.n_epochs
            );
        }

        for epoch in start_epoch..=params.n_epochs {
            println!("\n{}\nTrain epoch: {epoch}\n{}\n", "-".repeat(30), "-".repeat(30));
            let epoch_start   = Instant::now();
            let learning_rate = schedule.learning_rate(epoch);
            if schedule.is_reduced(epoch) {
                println!("Decrease learning rate, new lr = {learning_rate}");
            }

            println!("Training...");
            let train = this.train_one_epoch(provider.train(), params.batch_size, learning_rate)?;
            this.log_epoch(&train, epoch, "train")?;

            if params.validation_set {
                match provider.validation() {
                    Some(split) => {
                        println!("Validation...");
                        let valid = this.test(split, params.batch_size)?;
                        this.log_epoch(&valid, epoch, "valid")?;
                    }
                    None => tracing::warn!("Validation requested but the provider has no validation split"),
                }
            }

            let time_per_epoch = epoch_start.elapsed();
            let seconds_left   = estimate_remaining(time_per_epoch, params.n_epochs - epoch);
            println!(
                "Time per epoch: {}, Est. complete in: {}",
                format_duration(time_per_epoch),
                format_duration(seconds_left),
            );

            if this.should_save_model {
                this.save_model(epoch)?;
            }
        }

        println!("\nTotal training time: {}", format_duration(total_start.elapsed()));
        Ok(this)
    }

    /// Train on every full batch of `split`; leftover examples are skipped
    pub fn train_one_epoch(
        &mut self,
        split:         &mut dyn VideoSplit,
        batch_size:    usize,
        learning_rate: f64,
    ) -> Result<EpochMetrics> {
        let n_batches = split.num_examples() / batch_size.max(1);
        let mut acc = MetricAccumulator::new();

        for _ in 0..n_batches {
            let batch = self.batcher.batch(split.next_batch(batch_size)?)?;
            let (loss, accuracy) = self.ctx.train_step(batch, learning_rate);
            acc.push(loss, accuracy);

            let step = self.ctx.batches_step();
            tracing::debug!("batch {step}: loss={loss:.4} accuracy={accuracy:.4}");
            if let Some(scalars) = &self.scalars {
                scalars.log_loss_accuracy(&EpochMetrics { loss, accuracy }, step, "per_batch")?;
            }
        }

        Ok(acc.mean().ok_or_else(|| empty_split(&*split, batch_size))?)
    }

    /// Evaluate the current model on `split` without touching parameters
    pub fn test(&self, split: &mut dyn VideoSplit, batch_size: usize) -> Result<EpochMetrics> {
        let model = self.ctx.model().valid();
        evaluate(&model, &self.eval_batcher, split, batch_size)
    }

    fn log_epoch(&self, metrics: &EpochMetrics, epoch: usize, prefix: &str) -> Result<()> {
        println!("mean cross_entropy: {:.6}, mean accuracy: {:.6}", metrics.loss, metrics.accuracy);
        if let Some(scalars) = &self.scalars {
            scalars.log_loss_accuracy(metrics, epoch, prefix)?;
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{InMemoryProvider, VideoSample};
    use crate::data::synthetic::SyntheticConfig;
    use crate::domain::hyperparams::ModelType;
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    const DATA_SHAPE: [usize; 4] = [2, 4, 4, 1];

    fn tiny_hyper() -> HyperparameterSet {
        HyperparameterSet {
            growth_rate:  2,
            depth:        4,
            total_blocks: 1,
            keep_prob:    1.0,
            model_type:   ModelType::DenseNet,
            ..HyperparameterSet::default()
        }
    }

    fn tiny_config() -> DenseNet3dConfig {
        DenseNet3dConfig::new(tiny_hyper(), DATA_SHAPE.to_vec(), 2)
    }

    fn network(should_save: bool) -> NetworkConfig {
        NetworkConfig {
            hyper:             tiny_hyper(),
            dataset:           "tiny".to_string(),
            should_save_logs:  should_save,
            should_save_model: should_save,
            renew_logs:        false,
        }
    }

    /// Unshuffled: every fresh provider serves batches in the same order
    fn samples(n: usize) -> Vec<VideoSample> {
        let len: usize = DATA_SHAPE.iter().product();
        (0..n)
            .map(|i| {
                let label = i % 2;
                let video = (0..len)
                    .map(|j| (label as f32 - 0.5) + ((i * 7 + j) % 5) as f32 * 0.1)
                    .collect();
                VideoSample { video, label }
            })
            .collect()
    }

    fn provider(n_train: usize, n_valid: usize) -> InMemoryProvider {
        let p = InMemoryProvider::new(DATA_SHAPE.to_vec(), 2, samples(n_train)).unwrap();
        if n_valid > 0 { p.with_validation(samples(n_valid)).unwrap() } else { p }
    }

    fn trainer(
        root:  &Path,
        model: DenseNet3d<TestBackend>,
        save:  bool,
    ) -> DenseNetTrainer<TestBackend, impl Optimizer<DenseNet3d<TestBackend>, TestBackend>> {
        let network = network(save);
        let paths   = ModelPaths::new(root, &network).unwrap();
        let ctx = TrainingContext::new(
            model,
            nesterov_sgd::<TestBackend>(&network.hyper),
            Default::default(),
            &network.hyper,
        );
        DenseNetTrainer::new(ctx, tiny_config(), &network, &paths).unwrap()
    }

    fn params(n_epochs: usize, validation_set: bool) -> TrainParams {
        TrainParams {
            n_epochs,
            initial_learning_rate: 0.1,
            batch_size:            2,
            reduce_lr_epoch_1:     2,
            reduce_lr_epoch_2:     3,
            validation_set,
        }
    }

    fn weights(model: &DenseNet3d<TestBackend>) -> Vec<f32> {
        model.initial_conv.weight.val().into_data().to_vec().unwrap()
    }

    #[test]
    fn test_remainder_examples_are_dropped() {
        let root = TempDir::new().unwrap();
        let model = tiny_config().init(&Default::default()).unwrap();
        let mut t = trainer(root.path(), model, false);
        let mut data = provider(5, 0);

        let metrics = t.train_one_epoch(data.train(), 2, 0.1).unwrap();
        assert_eq!(t.batches_step(), 2);
        assert!(metrics.loss.is_finite());
        assert!((0.0..=1.0).contains(&metrics.accuracy));
    }

    #[test]
    fn test_split_smaller_than_a_batch_is_an_error() {
        let root = TempDir::new().unwrap();
        let model = tiny_config().init(&Default::default()).unwrap();
        let mut t = trainer(root.path(), model, false);
        let mut data = provider(1, 0);

        let err = t.train_one_epoch(data.train(), 2, 0.1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DenseNetError>(),
            Some(DenseNetError::EmptySplit { .. })
        ));
    }

    #[test]
    fn test_evaluation_leaves_parameters_untouched() {
        let root = TempDir::new().unwrap();
        let model = tiny_config().init(&Default::default()).unwrap();
        let t = trainer(root.path(), model, false);
        let before = weights(t.model());
        let mut data = provider(4, 4);

        let metrics = t.test(data.validation().unwrap(), 2).unwrap();
        assert!(metrics.loss.is_finite());
        assert_eq!(weights(t.model()), before);
        assert_eq!(t.batches_step(), 0);
    }

    #[test]
    fn test_reference_network_one_step() {
        let hyper = HyperparameterSet {
            growth_rate:  12,
            depth:        13,
            total_blocks: 3,
            ..HyperparameterSet::default()
        };
        assert_eq!(hyper.layers_per_block(), 3);

        let device = Default::default();
        let config = DenseNet3dConfig::new(hyper.clone(), vec![8, 32, 32, 3], 2);
        let model  = config.init::<TestBackend>(&device).unwrap();
        let mut ctx = TrainingContext::new(model, nesterov_sgd::<TestBackend>(&hyper), device, &hyper);

        let mut data = SyntheticConfig {
            n_classes:      2,
            data_shape:     vec![8, 32, 32, 3],
            train_examples: 4,
            valid_examples: 0,
            test_examples:  0,
            seed:           3,
        }
        .build()
        .unwrap();
        let batcher = VideoBatcher::<TestBackend>::new(ctx.device.clone(), &[8, 32, 32, 3], 2).unwrap();
        let batch = batcher.batch(data.train().next_batch(4).unwrap()).unwrap();

        let (loss, accuracy) = ctx.train_step(batch, 0.1);
        assert!(loss.is_finite());
        assert!((0.0..=1.0).contains(&accuracy));
        assert_eq!(ctx.batches_step(), 1);
    }

    /// An independent copy: `clone()` shares batch-norm running state
    fn deep_copy(model: &DenseNet3d<TestBackend>) -> DenseNet3d<TestBackend> {
        tiny_config()
            .init::<TestBackend>(&Default::default())
            .unwrap()
            .load_record(model.clone().into_record())
    }

    fn eval_logits<B: Backend>(model: &DenseNet3d<B>, device: &B::Device) -> Vec<f32> {
        let clip = Tensor::<B, 5>::ones([1, 2, 4, 4, 1], device);
        model.forward(clip, Mode::Eval).into_data().to_vec().unwrap()
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let device  = Default::default();
        let initial = tiny_config().init::<TestBackend>(&device).unwrap();

        let straight = TempDir::new().unwrap();
        let a = trainer(straight.path(), deep_copy(&initial), true)
            .train_all_epochs(&mut provider(4, 0), &params(3, false))
            .unwrap();

        let resumed = TempDir::new().unwrap();
        trainer(resumed.path(), deep_copy(&initial), true)
            .train_all_epochs(&mut provider(4, 0), &params(1, false))
            .unwrap();
        // A different initialisation: everything must come from the checkpoint
        let other = tiny_config().init::<TestBackend>(&device).unwrap();
        let b = trainer(resumed.path(), other, true)
            .train_all_epochs(&mut provider(4, 0), &params(3, false))
            .unwrap();

        assert_eq!(a.batches_step(), 6);
        assert_eq!(b.batches_step(), 6);
        for (x, y) in weights(a.model()).iter().zip(weights(b.model())) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }

        let la = eval_logits(&a.model().valid(), &device);
        let lb = eval_logits(&b.model().valid(), &device);
        for (x, y) in la.iter().zip(lb) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }

    #[test]
    fn test_eval_mode_sees_latest_running_stats() {
        let device = Default::default();
        let hyper  = tiny_hyper();
        let model  = tiny_config().init::<TestBackend>(&device).unwrap();
        let mut ctx = TrainingContext::new(model, nesterov_sgd::<TestBackend>(&hyper), device, &hyper);

        let batcher = VideoBatcher::<TestBackend>::new(ctx.device.clone(), &DATA_SHAPE, 2).unwrap();
        let mut data = provider(4, 0);
        for _ in 0..2 {
            let batch = batcher.batch(data.train().next_batch(2).unwrap()).unwrap();
            ctx.train_step(batch, 0.1);
        }

        let on_training_model = eval_logits(ctx.model(), &ctx.device);
        let on_inner_model    = eval_logits(&ctx.model().valid(), &ctx.device);
        for (x, y) in on_training_model.iter().zip(on_inner_model) {
            assert!((x - y).abs() < 1e-6, "{x} vs {y}");
        }
    }

    #[test]
    fn test_full_run_writes_checkpoints_and_logs() {
        let root  = TempDir::new().unwrap();
        let model = tiny_config().init(&Default::default()).unwrap();
        let done  = trainer(root.path(), model, true)
            .train_all_epochs(&mut provider(4, 2), &params(2, true))
            .unwrap();
        assert_eq!(done.batches_step(), 4);

        let paths = ModelPaths::resolve(root.path(), &network(true)).unwrap();
        assert!(paths.save_path.join("model.chkpt-2.mpk.gz").exists());
        assert!(paths.save_path.join("config.json").exists());

        let log = std::fs::read_to_string(paths.logs_path.join("scalars.csv")).unwrap();
        assert_eq!(log.lines().filter(|l| l.starts_with("loss_per_batch,")).count(), 4);
        assert_eq!(log.lines().filter(|l| l.starts_with("accuracy_valid,")).count(), 2);

        // Everything is already trained: the rerun restores and stops
        let model = tiny_config().init(&Default::default()).unwrap();
        let (again, start_epoch) = trainer(root.path(), model, true).load_model().unwrap();
        assert_eq!(start_epoch, 3);
        assert_eq!(again.batches_step(), 4);
        assert_eq!(weights(again.model()), weights(done.model()));
    }
}
