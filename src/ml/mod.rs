// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. Layers above only see configs,
// plans and metrics.
//
//   layers.rs      - conv/pool/batch-norm/dropout primitives
//                    with SAME padding on the depth axis too
//   topology.rs    - pure shape arithmetic: channel counts and
//                    feature-map extents for every stage
//   dense_block.rs - composite function, bottleneck, dense
//                    block, transition and classification head
//   model.rs       - the full 3D DenseNet, cross-entropy,
//                    accuracy and L2 penalty
//   schedule.rs    - staged learning-rate decay
//   trainer.rs     - epoch loop, Nesterov SGD, validation,
//                    checkpoint/resume
//
// Layout inside the network is channels-first,
// [batch, channels, depth, height, width]. The model permutes
// the incoming [batch, depth, height, width, channels] once.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Huang et al. (2017) Densely Connected Convolutional Networks

/// Primitive 3D layers and SAME-padding arithmetic
pub mod layers;

/// Feature-map shapes and parameter counts, no tensors
pub mod topology;

/// Dense blocks, transitions and the classification head
pub mod dense_block;

/// The assembled 3D DenseNet
pub mod model;

/// Learning-rate schedule
pub mod schedule;

/// Training loop with validation and checkpointing
pub mod trainer;
