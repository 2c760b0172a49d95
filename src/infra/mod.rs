// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in any
// specific business layer:
//
//   checkpoint.rs — Saving and loading model weights
//                   Uses Burn's BinFileRecorder at full
//                   precision, written atomically. Also
//                   saves/loads TrainConfig and the channel
//                   statistics as JSON so `evaluate` can
//                   rebuild the exact run.
//
//   metrics.rs    — Sample-weighted epoch statistics and
//                   the per-epoch metrics CSV.
//
//   plots.rs      — Confusion matrix SVG and the grid of
//                   most confidently misclassified images.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Epoch statistics and the metrics CSV logger
pub mod metrics;

/// SVG / PNG report artefacts
pub mod plots;
