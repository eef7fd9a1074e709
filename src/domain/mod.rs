// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust types and traits describing what the training
// run is made of. The training loop is written against these
// traits only, so it can be driven by the Burn learner in
// production and by small fakes in tests.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Error taxonomy shared by every layer below the CLI
pub mod error;

// Host-side image tensors (what gets written to sample grids)
pub mod image;

// The optimizer's mutable learning-rate field
pub mod param_group;

// Per-step observations and per-epoch summaries
pub mod progress;

// Input/reconstruction pairs produced by the sampler
pub mod sample;

// Core abstractions (traits) that other layers implement
pub mod traits;
