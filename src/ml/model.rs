// ============================================================
// Layer 5 - DenseNet3d Network
// ============================================================
// The full forward computation from videos to logits:
//
//   videos [N, D, H, W, C]
//     → permute to [N, C, D, H, W]
//     → initial conv (k=7, strides [1,2,2]) → initial avg pool
//     → dense block 1 → transition 1 → … → dense block T
//     → head (BN → ReLU → global avg pool → FC) → logits
//
// Construction validates the configuration and plans the whole
// topology first; no module is allocated for a bad config.
//
// Objective per batch:
//   cross_entropy(logits, labels) + weight_decay · l2_loss()
//   l2_loss = Σ over trainable tensors of Σ p² / 2
//
// Reference: Huang et al. (2017) Densely Connected Convolutional
//            Networks
//            Burn Book §3 (Modules), §5 (Training)

use burn::{
    nn::conv::Conv3d,
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::domain::error::Result as DenseNetResult;
use crate::domain::hyperparams::HyperparameterSet;
use crate::ml::dense_block::{DenseBlock, TransitionLayer, TransitionToClasses};
use crate::ml::layers::{conv3d, Mode, Padding};
use crate::ml::topology::{initial_pool, TopologyPlan, INITIAL_KERNEL, INITIAL_STRIDES};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct DenseNet3dConfig {
    pub hyper:      HyperparameterSet,
    /// [sequence_length, height, width, channels]
    pub data_shape: Vec<usize>,
    pub n_classes:  usize,
}

impl DenseNet3dConfig {
    pub fn plan(&self) -> DenseNetResult<TopologyPlan> {
        TopologyPlan::plan(&self.hyper, &self.data_shape, self.n_classes)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseNetResult<DenseNet3d<B>> {
        let plan = self.plan()?;
        let keep_prob = self.hyper.keep_prob;

        let initial_conv = conv3d(
            plan.input.channels,
            plan.initial.channels,
            INITIAL_KERNEL,
            INITIAL_STRIDES,
            Padding::Same,
            device,
        );
        let blocks = plan
            .blocks
            .iter()
            .map(|b| DenseBlock::new(b, plan.growth_rate, keep_prob, device))
            .collect();
        let transitions = plan
            .transitions
            .iter()
            .map(|t| TransitionLayer::new(t, keep_prob, device))
            .collect();
        let head = TransitionToClasses::new(plan.final_features(), plan.n_classes, device);

        Ok(DenseNet3d { initial_conv, blocks, transitions, head })
    }
}

#[derive(Module, Debug)]
pub struct DenseNet3d<B: Backend> {
    pub initial_conv: Conv3d<B>,
    pub blocks:       Vec<DenseBlock<B>>,
    pub transitions:  Vec<TransitionLayer<B>>,
    pub head:         TransitionToClasses<B>,
}

/// Per-batch result of a classification forward pass
pub struct ClassificationOutput<B: Backend> {
    pub logits:   Tensor<B, 2>,
    /// Mean softmax cross-entropy, shape [1]
    pub loss:     Tensor<B, 1>,
    /// Fraction of rows whose argmax matches the label, shape [1]
    pub accuracy: Tensor<B, 1>,
}

impl<B: Backend> DenseNet3d<B> {
    /// videos: [batch, seq_len, height, width, channels] → logits [batch, n_classes]
    pub fn forward(&self, videos: Tensor<B, 5>, mode: Mode) -> Tensor<B, 2> {
        let x = videos.permute([0, 4, 1, 2, 3]);
        let x = self.initial_conv.forward(x);
        let mut x = initial_pool().forward(x);

        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward(x, mode);
            if let Some(transition) = self.transitions.get(i) {
                x = transition.forward(x, mode);
            }
        }
        self.head.forward(x, mode)
    }

    pub fn forward_classification(
        &self,
        videos: Tensor<B, 5>,
        labels: Tensor<B, 2>,
        mode:   Mode,
    ) -> ClassificationOutput<B> {
        let logits = self.forward(videos, mode);

        let loss = (labels.clone() * log_softmax(logits.clone(), 1))
            .sum_dim(1)
            .mean()
            .neg();
        let accuracy = logits
            .clone()
            .argmax(1)
            .equal(labels.argmax(1))
            .float()
            .mean();

        ClassificationOutput { logits, loss, accuracy }
    }

    /// Σ p² / 2 over every trainable tensor, batch-norm scale and shift included
    pub fn l2_loss(&self) -> Tensor<B, 1> {
        let weight = self.initial_conv.weight.val();
        let device = weight.device();
        let mut total = (weight.clone() * weight).sum();
        for block in &self.blocks {
            total = total + block.l2_sum(&device);
        }
        for transition in &self.transitions {
            total = total + transition.l2_sum();
        }
        (total + self.head.l2_sum()) / 2.0
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hyperparams::ModelType;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    fn config(depth: usize, total_blocks: usize, bc_mode: bool, data_shape: Vec<usize>) -> DenseNet3dConfig {
        let hyper = HyperparameterSet {
            growth_rate: 4,
            depth,
            total_blocks,
            bc_mode,
            model_type: if bc_mode { ModelType::DenseNetBc } else { ModelType::DenseNet },
            reduction:  if bc_mode { 0.5 } else { 1.0 },
            keep_prob:  1.0,
            ..HyperparameterSet::default()
        };
        DenseNet3dConfig::new(hyper, data_shape, 3)
    }

    #[test]
    fn test_logits_shape_for_both_variants() {
        let device = Default::default();
        for (depth, blocks, bc) in [(7, 2, false), (10, 3, true), (4, 1, false)] {
            let model = config(depth, blocks, bc, vec![4, 8, 8, 2])
                .init::<TestBackend>(&device)
                .unwrap();
            let videos = Tensor::<TestBackend, 5>::ones([2, 4, 8, 8, 2], &device);
            assert_eq!(model.forward(videos, Mode::Eval).dims(), [2, 3], "depth {depth}");
        }
    }

    #[test]
    fn test_param_count_matches_plan() {
        let device = Default::default();
        for bc in [false, true] {
            let cfg = config(10, 3, bc, vec![4, 8, 8, 2]);
            let plan  = cfg.plan().unwrap();
            let model = cfg.init::<TestBackend>(&device).unwrap();
            assert_eq!(model.num_params(), plan.trainable_params() + running_stats(&plan), "bc {bc}");
        }
    }

    /// Running mean and variance, two per normalised channel. Burn
    /// counts them in `num_params()` though no optimizer touches them.
    fn running_stats(plan: &TopologyPlan) -> usize {
        let layers: usize = plan.blocks.iter()
            .flat_map(|b| &b.layers)
            .map(|l| l.in_channels + l.bottleneck_channels.unwrap_or(0))
            .sum();
        let transitions: usize = plan.transitions.iter().map(|t| t.input.channels).sum();
        2 * (layers + transitions + plan.final_features())
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let cfg  = config(10, 3, true, vec![4, 8, 8, 2]);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DenseNet3dConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hyper, cfg.hyper);
        assert_eq!(back.data_shape, cfg.data_shape);
        assert_eq!(back.n_classes, cfg.n_classes);
        assert_eq!(back.plan().unwrap(), cfg.plan().unwrap());
    }

    #[test]
    fn test_invalid_config_allocates_nothing() {
        let device = Default::default();
        assert!(config(3, 3, false, vec![4, 8, 8, 2]).init::<TestBackend>(&device).is_err());
        assert!(config(7, 2, false, vec![8, 8, 2]).init::<TestBackend>(&device).is_err());
    }

    #[test]
    fn test_classification_metrics() {
        let device = Default::default();
        let model = config(4, 1, false, vec![2, 4, 4, 1]).init::<TestBackend>(&device).unwrap();
        let videos = Tensor::<TestBackend, 5>::zeros([2, 2, 4, 4, 1], &device);
        let labels = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0], [2, 3]),
            &device,
        );
        let out = model.forward_classification(videos, labels, Mode::Eval);
        let loss: f32 = out.loss.into_scalar();
        let accuracy: f32 = out.accuracy.into_scalar();
        assert!(loss.is_finite() && loss > 0.0);
        // Both rows see the same input, so at most one label can match
        assert!(accuracy == 0.0 || accuracy == 0.5);
    }

    #[test]
    fn test_l2_loss_covers_every_layer() {
        let device = Default::default();
        let model = config(4, 1, false, vec![2, 4, 4, 1]).init::<TestBackend>(&device).unwrap();
        let l2: f32 = model.l2_loss().into_scalar();

        let conv = model.initial_conv.weight.val();
        let stem: f32 = (conv.clone() * conv).sum().into_scalar();
        assert!(l2 > stem / 2.0);
    }
}
