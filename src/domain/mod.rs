// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs, enums, and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Hyperparameters that fully determine the network topology
pub mod hyperparams;

// Construction and training option sets
pub mod config;

// Framework-free batch of videos and one-hot labels
pub mod batch;

// The DataProvider / VideoSplit contract
pub mod traits;

// The error taxonomy shared by every layer
pub mod error;
