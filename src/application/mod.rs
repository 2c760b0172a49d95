// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or evaluating a checkpoint).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow (also owns TrainConfig)
pub mod train_use_case;

// Test-only re-run from a saved checkpoint
pub mod evaluate_use_case;

// Error analysis and report writing, shared by both workflows
pub mod analysis;
