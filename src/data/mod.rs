// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything between raw video samples and tensor batches.
//
//   SyntheticConfig     → seeded, class-separable samples
//       │
//       ▼
//   InMemoryProvider    → train / validation / test splits
//       │                 (DataProvider contract)
//       ▼
//   VideoSplit          → next_batch() → VideoBatchData
//       │
//       ▼
//   VideoBatcher        → shape-checked tensors on the device
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// In-memory samples, splits and provider
pub mod dataset;

/// Seeded synthetic video data
pub mod synthetic;

/// Turns plain batches into backend tensors
pub mod batcher;
