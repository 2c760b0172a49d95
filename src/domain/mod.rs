// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// pipeline works with.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything here is testable without a device.

// Raw labelled images and their shape
pub mod image;

// Prediction records, error ranking, confusion matrix
pub mod prediction;

// The Training/Validating epoch state machine
pub mod cycle;

// Core abstractions (traits) that other layers implement
pub mod traits;
