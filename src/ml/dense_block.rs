// ============================================================
// Layer 5 - Dense Blocks and Transitions
// ============================================================
// CompositeFunction     BN → ReLU → conv → dropout
// Bottleneck (BC mode)  BN → ReLU → 1×1×1 conv to 4·growth_rate
//                       (VALID) → dropout
// InternalLayer         [bottleneck →] composite(k=3), then the
//                       layer's input and output are concatenated
//                       along the channel axis
// DenseBlock            internal layers applied in sequence
// TransitionLayer       composite(k=1) to floor(C·reduction)
//                       channels → avg pool [pool_depth, 2, 2]
// TransitionToClasses   BN → ReLU → global avg pool → flatten → FC
//
// Every module is sized from the TopologyPlan, never inferred
// from a tensor at run time.
//
// Reference: Huang et al. (2017) Densely Connected Convolutional
//            Networks, §3 (Dense connectivity, Composite function,
//            Bottleneck layers, Compression)

use burn::{
    module::Param,
    nn::{conv::Conv3d, BatchNorm, Dropout, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::layers::{
    batch_norm, batch_norm_layer, conv3d, dropout, dropout_layer, xavier, Mode, Padding, Pool3d,
    PoolKind,
};
use crate::ml::topology::{transition_pool, BlockPlan, TransitionPlan, BOTTLENECK_FACTOR};

/// Σ p² over every element of a tensor
fn sum_squares<B: Backend, const D: usize>(t: Tensor<B, D>) -> Tensor<B, 1> {
    (t.clone() * t).sum()
}

fn norm_squares<B: Backend>(bn: &BatchNorm<B>) -> Tensor<B, 1> {
    sum_squares(bn.gamma.val()) + sum_squares(bn.beta.val())
}

// ─── CompositeFunction ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CompositeFunction<B: Backend> {
    pub norm:    BatchNorm<B>,
    pub conv:    Conv3d<B>,
    pub dropout: Dropout,
}

impl<B: Backend> CompositeFunction<B> {
    /// BN → ReLU → conv(kernel_size, SAME) → dropout
    pub fn new(
        in_features:  usize,
        out_features: usize,
        kernel_size:  usize,
        keep_prob:    f64,
        device:       &B::Device,
    ) -> Self {
        Self::with_padding(in_features, out_features, kernel_size, Padding::Same, keep_prob, device)
    }

    /// BN → ReLU → conv(1, VALID) to `4 · growth_rate` → dropout
    pub fn bottleneck(in_features: usize, growth_rate: usize, keep_prob: f64, device: &B::Device) -> Self {
        Self::with_padding(
            in_features,
            BOTTLENECK_FACTOR * growth_rate,
            1,
            Padding::Valid,
            keep_prob,
            device,
        )
    }

    fn with_padding(
        in_features:  usize,
        out_features: usize,
        kernel_size:  usize,
        padding:      Padding,
        keep_prob:    f64,
        device:       &B::Device,
    ) -> Self {
        Self {
            norm:    batch_norm_layer(in_features, device),
            conv:    conv3d(in_features, out_features, kernel_size, [1, 1, 1], padding, device),
            dropout: dropout_layer(keep_prob),
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
        let x = relu(batch_norm(&self.norm, x, mode));
        let x = self.conv.forward(x);
        dropout(&self.dropout, x, mode)
    }

    pub fn l2_sum(&self) -> Tensor<B, 1> {
        norm_squares(&self.norm) + sum_squares(self.conv.weight.val())
    }
}

// ─── InternalLayer ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct InternalLayer<B: Backend> {
    pub bottleneck: Option<CompositeFunction<B>>,
    pub composite:  CompositeFunction<B>,
}

impl<B: Backend> InternalLayer<B> {
    pub fn forward(&self, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
        let y = match &self.bottleneck {
            Some(bottleneck) => bottleneck.forward(x.clone(), mode),
            None             => x.clone(),
        };
        let y = self.composite.forward(y, mode);
        Tensor::cat(vec![x, y], 1)
    }

    pub fn l2_sum(&self) -> Tensor<B, 1> {
        let composite = self.composite.l2_sum();
        match &self.bottleneck {
            Some(bottleneck) => bottleneck.l2_sum() + composite,
            None             => composite,
        }
    }
}

// ─── DenseBlock ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub layers: Vec<InternalLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn new(plan: &BlockPlan, growth_rate: usize, keep_prob: f64, device: &B::Device) -> Self {
        let layers = plan
            .layers
            .iter()
            .map(|layer| {
                let bottleneck = layer
                    .bottleneck_channels
                    .map(|_| CompositeFunction::bottleneck(layer.in_channels, growth_rate, keep_prob, device));
                let composite_in = layer.bottleneck_channels.unwrap_or(layer.in_channels);
                InternalLayer {
                    bottleneck,
                    composite: CompositeFunction::new(composite_in, growth_rate, 3, keep_prob, device),
                }
            })
            .collect();
        Self { layers }
    }

    pub fn forward(&self, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
        self.layers.iter().fold(x, |x, layer| layer.forward(x, mode))
    }

    pub fn l2_sum(&self, device: &B::Device) -> Tensor<B, 1> {
        self.layers
            .iter()
            .fold(Tensor::zeros([1], device), |acc, layer| acc + layer.l2_sum())
    }
}

// ─── TransitionLayer ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TransitionLayer<B: Backend> {
    pub compress:   CompositeFunction<B>,
    pub pool_depth: usize,
}

impl<B: Backend> TransitionLayer<B> {
    pub fn new(plan: &TransitionPlan, keep_prob: f64, device: &B::Device) -> Self {
        Self {
            compress: CompositeFunction::new(
                plan.input.channels,
                plan.output.channels,
                1,
                keep_prob,
                device,
            ),
            pool_depth: plan.pool_depth,
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
        let x = self.compress.forward(x, mode);
        transition_pool(self.pool_depth).forward(x)
    }

    pub fn l2_sum(&self) -> Tensor<B, 1> {
        self.compress.l2_sum()
    }
}

// ─── TransitionToClasses ──────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TransitionToClasses<B: Backend> {
    pub norm: BatchNorm<B>,
    pub fc:   Linear<B>,
}

impl<B: Backend> TransitionToClasses<B> {
    /// FC weight is Xavier-initialised, its bias starts at zero
    pub fn new(features: usize, n_classes: usize, device: &B::Device) -> Self {
        let mut fc = LinearConfig::new(features, n_classes)
            .with_initializer(xavier())
            .init(device);
        fc.bias = Some(Param::from_tensor(Tensor::zeros([n_classes], device)));
        Self { norm: batch_norm_layer(features, device), fc }
    }

    /// x: [batch, features, depth, height, width] → logits [batch, n_classes]
    pub fn forward(&self, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 2> {
        let [batch, features, depth, height, width] = x.dims();
        let x = relu(batch_norm(&self.norm, x, mode));
        let x = Pool3d::global(PoolKind::Avg, [depth, height, width]).forward(x);
        self.fc.forward(x.reshape([batch, features]))
    }

    pub fn l2_sum(&self) -> Tensor<B, 1> {
        let weight = norm_squares(&self.norm) + sum_squares(self.fc.weight.val());
        match &self.fc.bias {
            Some(bias) => weight + sum_squares(bias.val()),
            None       => weight,
        }
    }
}
