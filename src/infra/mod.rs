// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the trainer and use cases:
//
//   lifecycle.rs  - model identifier and the saves/ and logs/
//                   directories derived from it
//
//   checkpoint.rs - model and optimizer records via Burn's
//                   NamedMpkGzFileRecorder, checkpoint.json
//                   bookkeeping and the saved network config
//
//   metrics.rs    - loss/accuracy accumulation and the
//                   scalars.csv logger
//
//   timing.rs     - H:MM:SS formatting and ETAs
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model identifier and on-disk layout
pub mod lifecycle;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics and scalar logging
pub mod metrics;

/// Duration formatting
pub mod timing;
