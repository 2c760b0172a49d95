// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches Burn modules, optimizers or backends:
//
//   model.rs     — AlexNet for 32x32 (or any multiple of 16)
//                  RGB images: five 3x3 conv layers, three
//                  max-pools, three fully connected layers
//
//   trainer.rs   — The epoch loop: forward, cross-entropy,
//                  backward, optimizer step, validation and
//                  best-checkpoint saving
//
//   evaluator.rs — Reloads the best checkpoint and produces
//                  test metrics plus per-example predictions
//
//   device.rs    — Resolves GPU/CPU once and runs the pipeline
//                  generically over the chosen backend
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Krizhevsky et al. (2012) ImageNet Classification
//            with Deep Convolutional Neural Networks

/// AlexNet architecture and its config
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Test-set evaluation from the best checkpoint
pub mod evaluator;

/// Execution context (backend + device selection)
pub mod device;
