// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Each use case wires the lower layers together for one goal.
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Train, validate, checkpoint, then score the test split
pub mod train_use_case;

// Restore a checkpoint and score one split
pub mod evaluate_use_case;

// Print the layer plan without building the network
pub mod inspect_use_case;
