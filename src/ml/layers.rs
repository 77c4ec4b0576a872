// ============================================================
// Layer 5 - Layer Primitives
// ============================================================
// The small building blocks every dense block is made of:
//
//   conv3d      - 3D convolution, variance-scaling init, no bias,
//                 SAME or VALID padding
//   Pool3d      - average / max pooling over [depth, height, width]
//                 with TensorFlow-style SAME windows
//   batch_norm  - per-channel normalisation, mode-aware
//   dropout     - inverted dropout, mode-aware
//
// Tensors inside the network are channels-first:
//   [batch, channels, depth, height, width]
//
// SAME semantics:
//   out         = ceil(n / stride)
//   pad_total   = max((out - 1) * stride + window - n, 0)
//   pad_before  = pad_total / 2      (the smaller half goes first)
//   Padded cells are excluded from averages and from maxima.
//
// For convolutions every kernel is odd, so SAME is realised as
// symmetric padding k/2, which yields the same output extent.
//
// Reference: He et al. (2015) Delving Deep into Rectifiers (msra init)
//            Glorot & Bengio (2010) (xavier init)
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv3d, Conv3dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, PaddingConfig3d,
    },
    prelude::*,
};

// ─── Mode ─────────────────────────────────────────────────────────────────────
/// Whether a forward pass is part of training or evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Same,
    Valid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Avg,
    Max,
}

// ─── Initializers ─────────────────────────────────────────────────────────────
/// Variance scaling, fan-in, normal: std = sqrt(2 / fan_in)
pub fn msra() -> Initializer {
    Initializer::KaimingNormal {
        gain:          std::f64::consts::SQRT_2,
        fan_out_only:  false,
    }
}

pub fn xavier() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

// ─── Convolution ──────────────────────────────────────────────────────────────
/// Build a cubic-kernel 3D convolution. `strides` is [depth, height, width].
pub fn conv3d<B: Backend>(
    in_features:  usize,
    out_features: usize,
    kernel_size:  usize,
    strides:      [usize; 3],
    padding:      Padding,
    device:       &B::Device,
) -> Conv3d<B> {
    let pad = match padding {
        Padding::Same  => kernel_size / 2,
        Padding::Valid => 0,
    };
    Conv3dConfig::new([in_features, out_features], [kernel_size; 3])
        .with_stride(strides)
        .with_padding(PaddingConfig3d::Explicit(pad, pad, pad))
        .with_bias(false)
        .with_initializer(msra())
        .init(device)
}

/// Output extent along one axis of a SAME convolution or pool
pub fn same_extent(extent: usize, stride: usize) -> usize {
    extent.div_ceil(stride)
}

/// `(output extent, padding before)` for a SAME window along one axis
pub fn same_padding(extent: usize, window: usize, stride: usize) -> (usize, usize) {
    let out       = same_extent(extent, stride);
    let pad_total = ((out - 1) * stride + window).saturating_sub(extent);
    (out, pad_total / 2)
}

// ─── Pooling ──────────────────────────────────────────────────────────────────
/// A SAME-padded pooling window over [depth, height, width]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool3d {
    pub kind:    PoolKind,
    pub window:  [usize; 3],
    pub strides: [usize; 3],
}

impl Pool3d {
    /// Window `d` deep and `k`×`k` spatially; strides default to the window.
    pub fn new(kind: PoolKind, k: usize, d: usize) -> Self {
        Self { kind, window: [d, k, k], strides: [d, k, k] }
    }

    /// One window spanning the whole `[depth, height, width]` extent
    pub fn global(kind: PoolKind, extent: [usize; 3]) -> Self {
        let [depth, height, width] = extent;
        Self::new(kind, height, depth).with_width(width).with_width_stride(width)
    }

    pub fn with_width(mut self, width_k: usize) -> Self {
        self.window[2] = width_k;
        self
    }

    /// Stride along height, and along width unless overridden afterwards
    pub fn with_spatial_stride(mut self, k_stride: usize) -> Self {
        self.strides[1] = k_stride;
        self.strides[2] = k_stride;
        self
    }

    pub fn with_width_stride(mut self, k_stride_width: usize) -> Self {
        self.strides[2] = k_stride_width;
        self
    }

    pub fn with_depth_stride(mut self, d_stride: usize) -> Self {
        self.strides[0] = d_stride;
        self
    }

    pub fn output_extent(&self, extent: [usize; 3]) -> [usize; 3] {
        [
            same_extent(extent[0], self.strides[0]),
            same_extent(extent[1], self.strides[1]),
            same_extent(extent[2], self.strides[2]),
        ]
    }

    /// x: [batch, channels, depth, height, width]
    ///
    /// Box windows with padding excluded are separable for both
    /// kinds, so the pool runs one spatial axis at a time.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let mut x = x;
        for axis in 0..3 {
            x = pool_axis(x, axis + 2, self.window[axis], self.strides[axis], self.kind);
        }
        x
    }
}

fn pool_axis<B: Backend>(
    x:      Tensor<B, 5>,
    dim:    usize,
    window: usize,
    stride: usize,
    kind:   PoolKind,
) -> Tensor<B, 5> {
    let extent = x.dims()[dim];
    if window == 1 && stride == 1 {
        return x;
    }

    let (out, pad_before) = same_padding(extent, window, stride);
    let slices: Vec<Tensor<B, 5>> = (0..out)
        .map(|o| {
            // Clip the padded window [start, start + window) to the input
            let start = (o * stride) as isize - pad_before as isize;
            let lo    = start.max(0) as usize;
            let hi    = ((start + window as isize) as usize).min(extent);
            let cells = x.clone().narrow(dim, lo, hi - lo);
            match kind {
                PoolKind::Avg => cells.mean_dim(dim),
                PoolKind::Max => cells.max_dim(dim),
            }
        })
        .collect();

    Tensor::cat(slices, dim)
}

// ─── Batch Normalisation ──────────────────────────────────────────────────────
pub const BN_EPSILON:  f64 = 1e-3;
/// Running average update weight; a decay of 0.999
pub const BN_MOMENTUM: f64 = 1e-3;

pub fn batch_norm_layer<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B> {
    BatchNormConfig::new(channels)
        .with_epsilon(BN_EPSILON)
        .with_momentum(BN_MOMENTUM)
        .init(device)
}

/// Train: batch statistics, running statistics updated in the same pass.
/// Eval:  running statistics only, including the latest Train update.
pub fn batch_norm<B: Backend>(bn: &BatchNorm<B>, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
    match mode {
        Mode::Train => bn.forward(x),
        Mode::Eval  => {
            let [_, channels, _, _, _] = x.dims();
            let shape = [1, channels, 1, 1, 1];
            let mean  = bn.running_mean.value_sync().reshape(shape);
            let var   = bn.running_var.value_sync().reshape(shape);
            let gamma = bn.gamma.val().reshape(shape);
            let beta  = bn.beta.val().reshape(shape);
            (x - mean) / var.add_scalar(bn.epsilon).sqrt() * gamma + beta
        }
    }
}

// ─── Dropout ──────────────────────────────────────────────────────────────────
pub fn dropout_layer(keep_prob: f64) -> Dropout {
    DropoutConfig::new(1.0 - keep_prob).init()
}

pub fn dropout<B: Backend>(layer: &Dropout, x: Tensor<B, 5>, mode: Mode) -> Tensor<B, 5> {
    if mode == Mode::Train && layer.prob > 0.0 {
        layer.forward(x)
    } else {
        x
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::TensorData,
    };

    type TestBackend = NdArray;

    fn row(values: Vec<f32>) -> Tensor<TestBackend, 5> {
        let n = values.len();
        Tensor::from_data(TensorData::new(values, [1, 1, 1, 1, n]), &Default::default())
    }

    fn values(x: Tensor<TestBackend, 5>) -> Vec<f32> {
        x.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_same_padding() {
        assert_eq!(same_padding(32, 3, 2), (16, 0));
        assert_eq!(same_padding(15, 3, 2), (8, 1));
        assert_eq!(same_padding(8, 3, 1), (8, 1));
        assert_eq!(same_padding(5, 2, 2), (3, 0));
        assert_eq!(same_padding(4, 4, 4), (1, 0));
    }

    #[test]
    fn test_avg_pool_excludes_padding() {
        let pool = Pool3d::new(PoolKind::Avg, 2, 1);
        let out  = pool.forward(row(vec![1.0, 2.0, 3.0]));
        assert_eq!(out.dims(), [1, 1, 1, 1, 2]);
        assert_eq!(values(out), vec![1.5, 3.0]);
    }

    #[test]
    fn test_max_pool_ignores_padding() {
        let pool = Pool3d::new(PoolKind::Max, 2, 1);
        let out  = pool.forward(row(vec![-1.0, -2.0, -3.0]));
        assert_eq!(values(out), vec![-1.0, -3.0]);
    }

    #[test]
    fn test_overlapping_window_centres() {
        // window 3, stride 1: padding one cell on each side
        let pool = Pool3d::new(PoolKind::Avg, 3, 1).with_spatial_stride(1);
        let out  = pool.forward(row(vec![0.0, 3.0, 6.0]));
        assert_eq!(values(out), vec![1.5, 3.0, 4.5]);
    }

    #[test]
    fn test_width_window_and_stride_override() {
        let pool = Pool3d::new(PoolKind::Max, 1, 1).with_width(2).with_width_stride(2);
        assert_eq!(pool.window, [1, 1, 2]);
        assert_eq!(pool.strides, [1, 1, 2]);
        let out = pool.forward(row(vec![1.0, 5.0, 2.0, 3.0]));
        assert_eq!(values(out), vec![5.0, 3.0]);
    }

    #[test]
    fn test_global_pool_collapses_extent() {
        let x = Tensor::<TestBackend, 5>::ones([2, 3, 3, 5, 4], &Default::default());
        let out = Pool3d::global(PoolKind::Avg, [3, 5, 4]).forward(x);
        assert_eq!(out.dims(), [2, 3, 1, 1, 1]);
    }

    #[test]
    fn test_pool_output_extent() {
        let initial = Pool3d::new(PoolKind::Avg, 3, 3)
            .with_spatial_stride(2)
            .with_depth_stride(1);
        assert_eq!(initial.output_extent([8, 16, 15]), [8, 8, 8]);
        let x = Tensor::<TestBackend, 5>::zeros([1, 2, 8, 16, 15], &Default::default());
        assert_eq!(initial.forward(x).dims(), [1, 2, 8, 8, 8]);
    }

    #[test]
    fn test_conv3d_same_extent() {
        let device = Default::default();
        let conv = conv3d::<TestBackend>(1, 4, 3, [1, 2, 2], Padding::Same, &device);
        let x = Tensor::<TestBackend, 5>::ones([1, 1, 5, 9, 9], &device);
        assert_eq!(conv.forward(x).dims(), [1, 4, 5, 5, 5]);
        assert!(conv.bias.is_none());
    }

    #[test]
    fn test_batch_norm_eval_uses_running_stats() {
        let device = Default::default();
        let bn = BatchNormConfig::new(2).with_epsilon(1e-3).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 5>::full([1, 2, 1, 1, 2], 2.0, &device);
        let out = values(batch_norm(&bn, x, Mode::Eval));
        let expected = 2.0 / (1.0f32 + 1e-3).sqrt();
        for v in out {
            assert!((v - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_batch_norm_train_normalises_batch() {
        let device = Default::default();
        let bn = BatchNormConfig::new(1).init::<Autodiff<TestBackend>>(&device);
        let x = Tensor::<Autodiff<TestBackend>, 5>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [1, 1, 1, 2, 2]),
            &device,
        );
        let out = batch_norm(&bn, x, Mode::Train);
        let mean: f32 = out.mean().into_scalar();
        assert!(mean.abs() < 1e-5);
    }

    #[test]
    fn test_dropout_is_identity_in_eval() {
        let layer = DropoutConfig::new(0.5).init();
        let device = Default::default();
        let x = Tensor::<Autodiff<TestBackend>, 5>::ones([1, 1, 2, 2, 2], &device);
        let out = dropout(&layer, x, Mode::Eval);
        let sum: f32 = out.sum().into_scalar();
        assert_eq!(sum, 8.0);
    }
}
