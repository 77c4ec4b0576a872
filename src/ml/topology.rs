// ============================================================
// Layer 5 - Topology Plan
// ============================================================
// A tensor-free walk through the network that derives, from the
// hyperparameters and the data shape alone, the channel count of
// every internal layer and the feature-map extent after every
// stage. The model sizes its modules from this plan, so a bad
// configuration is rejected before anything is allocated.
//
//   initial conv   k=7, strides [1,2,2]       → 2·growth_rate channels
//   initial pool   avg, window [3,3,3], strides [1,2,2]
//   dense block    each layer adds growth_rate channels
//                  (bc mode: 1×1×1 bottleneck of 4·growth_rate first)
//   transition     floor(channels · reduction) channels,
//                  avg pool window/stride [2,2,2]
//   head           BN → ReLU → global avg pool → FC(n_classes)
//
// Reference: Huang et al. (2017) Densely Connected Convolutional
//            Networks, Table 1

use std::fmt::Write as _;

use crate::domain::error::{DenseNetError, Result};
use crate::domain::hyperparams::HyperparameterSet;
use crate::ml::layers::{same_extent, Pool3d, PoolKind};

pub const INITIAL_KERNEL:        usize      = 7;
pub const INITIAL_STRIDES:       [usize; 3] = [1, 2, 2];
pub const TRANSITION_POOL_DEPTH: usize      = 2;
pub const BOTTLENECK_FACTOR:     usize      = 4;

/// Average pool after the initial convolution
pub fn initial_pool() -> Pool3d {
    Pool3d::new(PoolKind::Avg, 3, 3)
        .with_spatial_stride(2)
        .with_depth_stride(1)
}

/// Average pool closing every transition layer
pub fn transition_pool(pool_depth: usize) -> Pool3d {
    Pool3d::new(PoolKind::Avg, 2, pool_depth)
}

// ─── FeatureShape ─────────────────────────────────────────────────────────────
/// Per-sample feature map extent, channels-first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureShape {
    pub channels: usize,
    pub depth:    usize,
    pub height:   usize,
    pub width:    usize,
}

impl FeatureShape {
    pub fn extent(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    fn with_extent(self, channels: usize, [depth, height, width]: [usize; 3]) -> Self {
        Self { channels, depth, height, width }
    }
}

// ─── Plans ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    pub in_channels:         usize,
    /// Width of the 1×1×1 bottleneck, bc mode only
    pub bottleneck_channels: Option<usize>,
    /// in_channels + growth_rate after concatenation
    pub out_channels:        usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    pub input:  FeatureShape,
    pub layers: Vec<LayerPlan>,
    pub output: FeatureShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub input:      FeatureShape,
    pub output:     FeatureShape,
    pub pool_depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyPlan {
    pub input:       FeatureShape,
    pub initial:     FeatureShape,
    pub pooled:      FeatureShape,
    pub blocks:      Vec<BlockPlan>,
    pub transitions: Vec<TransitionPlan>,
    pub growth_rate: usize,
    pub n_classes:   usize,
}

impl TopologyPlan {
    /// `data_shape` is [sequence_length, height, width, channels]
    pub fn plan(hyper: &HyperparameterSet, data_shape: &[usize], n_classes: usize) -> Result<Self> {
        hyper.validate()?;
        let &[depth, height, width, channels] = data_shape else {
            return Err(DenseNetError::config(format!(
                "data_shape must have rank 4 [seq_len, height, width, channels], got {data_shape:?}"
            )));
        };
        if data_shape.contains(&0) {
            return Err(DenseNetError::config(format!(
                "data_shape dimensions must be non-zero, got {data_shape:?}"
            )));
        }
        if n_classes == 0 {
            return Err(DenseNetError::config("n_classes must be positive, got 0"));
        }

        let input = FeatureShape { channels, depth, height, width };

        let conv_extent = [
            same_extent(depth, INITIAL_STRIDES[0]),
            same_extent(height, INITIAL_STRIDES[1]),
            same_extent(width, INITIAL_STRIDES[2]),
        ];
        let initial = input.with_extent(hyper.first_output_features(), conv_extent);
        let pooled  = initial.with_extent(initial.channels, initial_pool().output_extent(initial.extent()));

        let mut blocks      = Vec::with_capacity(hyper.total_blocks);
        let mut transitions = Vec::with_capacity(hyper.total_blocks - 1);
        let mut current     = pooled;

        for block in 0..hyper.total_blocks {
            let block_input = current;
            let layers: Vec<LayerPlan> = (0..hyper.layers_per_block())
                .map(|i| {
                    let in_channels = block_input.channels + i * hyper.growth_rate;
                    LayerPlan {
                        in_channels,
                        bottleneck_channels: hyper
                            .bc_mode
                            .then_some(BOTTLENECK_FACTOR * hyper.growth_rate),
                        out_channels: in_channels + hyper.growth_rate,
                    }
                })
                .collect();
            let out_channels = layers.last().map_or(block_input.channels, |l| l.out_channels);
            current = block_input.with_extent(out_channels, block_input.extent());
            blocks.push(BlockPlan { input: block_input, layers, output: current });

            if block + 1 < hyper.total_blocks {
                let compressed = (current.channels as f64 * hyper.reduction).floor() as usize;
                if compressed == 0 {
                    return Err(DenseNetError::config(format!(
                        "reduction {} compresses {} channels after block {} to zero",
                        hyper.reduction, current.channels, block + 1
                    )));
                }
                let pool   = transition_pool(TRANSITION_POOL_DEPTH);
                let output = current.with_extent(compressed, pool.output_extent(current.extent()));
                transitions.push(TransitionPlan {
                    input: current,
                    output,
                    pool_depth: TRANSITION_POOL_DEPTH,
                });
                current = output;
            }
        }

        Ok(Self {
            input,
            initial,
            pooled,
            blocks,
            transitions,
            growth_rate: hyper.growth_rate,
            n_classes,
        })
    }

    /// Channels entering the classification head
    pub fn final_features(&self) -> usize {
        self.final_shape().channels
    }

    pub fn final_shape(&self) -> FeatureShape {
        self.blocks.last().map_or(self.pooled, |b| b.output)
    }

    /// Trainable parameters the plan implies: conv kernels, batch-norm
    /// scale and shift, FC weight and bias. Running statistics excluded.
    pub fn trainable_params(&self) -> usize {
        let conv = |cin: usize, cout: usize, k: usize| cin * cout * k * k * k;
        let bn   = |c: usize| 2 * c;

        let mut total = conv(self.input.channels, self.initial.channels, INITIAL_KERNEL);
        for block in &self.blocks {
            for layer in &block.layers {
                let composite_in = match layer.bottleneck_channels {
                    Some(width) => {
                        total += bn(layer.in_channels) + conv(layer.in_channels, width, 1);
                        width
                    }
                    None => layer.in_channels,
                };
                total += bn(composite_in) + conv(composite_in, self.growth_rate, 3);
            }
        }
        for t in &self.transitions {
            total += bn(t.input.channels) + conv(t.input.channels, t.output.channels, 1);
        }
        let features = self.final_features();
        total + bn(features) + features * self.n_classes + self.n_classes
    }

    /// Stage-by-stage table of channels and extents
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<24} {:>8} {:>6} {:>6} {:>6}", "stage", "channels", "depth", "height", "width");
        let mut row = |name: String, s: &FeatureShape| {
            let _ = writeln!(
                out,
                "{:<24} {:>8} {:>6} {:>6} {:>6}",
                name, s.channels, s.depth, s.height, s.width
            );
        };
        row("input".to_string(), &self.input);
        row("initial conv".to_string(), &self.initial);
        row("initial pool".to_string(), &self.pooled);
        for (i, block) in self.blocks.iter().enumerate() {
            row(format!("block {} ({} layers)", i + 1, block.layers.len()), &block.output);
            if let Some(t) = self.transitions.get(i) {
                row(format!("transition {}", i + 1), &t.output);
            }
        }
        row(format!("head → {} classes", self.n_classes), &self.final_shape());
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hyperparams::ModelType;

    fn hyper(growth_rate: usize, depth: usize, total_blocks: usize, bc_mode: bool) -> HyperparameterSet {
        HyperparameterSet {
            growth_rate,
            depth,
            total_blocks,
            bc_mode,
            model_type: if bc_mode { ModelType::DenseNetBc } else { ModelType::DenseNet },
            reduction:  if bc_mode { 0.5 } else { 1.0 },
            ..HyperparameterSet::default()
        }
    }

    #[test]
    fn test_reference_network_shapes() {
        let plan = TopologyPlan::plan(&hyper(12, 13, 3, false), &[8, 32, 32, 3], 2).unwrap();
        assert_eq!(plan.initial, FeatureShape { channels: 24, depth: 8, height: 16, width: 16 });
        assert_eq!(plan.pooled.extent(), [8, 8, 8]);
        assert_eq!(plan.blocks.len(), 3);
        assert_eq!(plan.transitions.len(), 2);
        assert_eq!(plan.blocks[0].output.channels, 60);
        assert_eq!(plan.transitions[0].output, FeatureShape { channels: 60, depth: 4, height: 4, width: 4 });
        assert_eq!(plan.transitions[1].output.extent(), [2, 2, 2]);
        assert_eq!(plan.final_features(), 132);
    }

    #[test]
    fn test_channel_growth_per_layer() {
        let plan = TopologyPlan::plan(&hyper(12, 40, 3, false), &[4, 16, 16, 1], 5).unwrap();
        let block = &plan.blocks[1];
        for (i, layer) in block.layers.iter().enumerate() {
            assert_eq!(layer.in_channels, block.input.channels + i * 12);
            assert_eq!(layer.out_channels, layer.in_channels + 12);
            assert_eq!(layer.bottleneck_channels, None);
        }
    }

    #[test]
    fn test_bottleneck_width() {
        let plan = TopologyPlan::plan(&hyper(8, 20, 3, true), &[4, 16, 16, 1], 2).unwrap();
        assert_eq!(plan.blocks[0].layers.len(), 2);
        for block in &plan.blocks {
            for layer in &block.layers {
                assert_eq!(layer.bottleneck_channels, Some(32));
                assert_eq!(layer.out_channels - layer.in_channels, 8);
            }
        }
    }

    #[test]
    fn test_compression_floors() {
        // growth 12, BC, 2 layers per block: 24 + 24 = 48 → 24; 24 + 24 = 48 → 24
        let mut h = hyper(12, 20, 3, true);
        h.reduction = 0.3;
        let plan = TopologyPlan::plan(&h, &[4, 16, 16, 1], 2).unwrap();
        // floor(48 · 0.3) = floor(14.4) = 14
        assert_eq!(plan.transitions[0].output.channels, 14);
        // 14 + 24 = 38 → floor(11.4) = 11
        assert_eq!(plan.transitions[1].output.channels, 11);
    }

    #[test]
    fn test_compression_to_zero_rejected() {
        let mut h = hyper(1, 5, 2, false);
        h.reduction = 0.2;
        let err = TopologyPlan::plan(&h, &[2, 4, 4, 1], 2).unwrap_err();
        assert!(err.to_string().contains("to zero"));
    }

    #[test]
    fn test_odd_extents_round_up() {
        let plan = TopologyPlan::plan(&hyper(4, 7, 2, false), &[5, 15, 13, 1], 2).unwrap();
        // conv: [5, 8, 7] → pool: [5, 4, 4] → transition: [3, 2, 2]
        assert_eq!(plan.initial.extent(), [5, 8, 7]);
        assert_eq!(plan.pooled.extent(), [5, 4, 4]);
        assert_eq!(plan.transitions[0].output.extent(), [3, 2, 2]);
    }

    #[test]
    fn test_bad_data_shape_rejected() {
        let h = hyper(12, 13, 3, false);
        assert!(TopologyPlan::plan(&h, &[32, 32, 3], 2).is_err());
        assert!(TopologyPlan::plan(&h, &[8, 0, 32, 3], 2).is_err());
        assert!(TopologyPlan::plan(&h, &[8, 32, 32, 3], 0).is_err());
    }

    #[test]
    fn test_param_count_by_hand() {
        // growth 2, depth 4, one block of 2 layers, input [2,4,4,1], 3 classes
        let plan = TopologyPlan::plan(&hyper(2, 4, 1, false), &[2, 4, 4, 1], 3).unwrap();
        let stem   = 1 * 4 * 343;
        let layer1 = 2 * 4 + 4 * 2 * 27;
        let layer2 = 2 * 6 + 6 * 2 * 27;
        let head   = 2 * 8 + 8 * 3 + 3;
        assert_eq!(plan.trainable_params(), stem + layer1 + layer2 + head);
    }

    #[test]
    fn test_initial_pool_averages() {
        use burn::{backend::NdArray, tensor::{Tensor, TensorData}};

        // [batch, channels, depth=1, height=2, width=1]: one window
        // over the two real cells, padding excluded
        let x = Tensor::<NdArray, 5>::from_data(
            TensorData::new(vec![0.0f32, 4.0], [1, 1, 1, 2, 1]),
            &Default::default(),
        );
        let out = initial_pool().forward(x);
        assert_eq!(out.dims(), [1, 1, 1, 1, 1]);
        assert_eq!(out.into_data().to_vec::<f32>().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_summary_lists_every_stage() {
        let plan = TopologyPlan::plan(&hyper(12, 13, 3, false), &[8, 32, 32, 3], 2).unwrap();
        let text = plan.summary();
        assert!(text.contains("block 3 (3 layers)"));
        assert!(text.contains("transition 2"));
        assert!(!text.contains("transition 3"));
    }
}
