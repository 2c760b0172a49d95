// ============================================================
// Layer 4 — Per-Channel Normaliser
// ============================================================
// Two steps, applied to every image of every partition:
//
//   1. Tensor conversion:  x = byte / 255          → [0, 1]
//   2. Normalisation:      x = (x - mean[c]) / std[c]
//
// mean and std are computed ONCE from the raw training pool,
// before any transform runs, and then reused unchanged for the
// validation and test partitions. They are also written next to
// the checkpoint so a later `evaluate` run normalises the test
// set with exactly the same numbers.
//
// std is the population standard deviation (divide by N).

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::image::{ImageShape, RawImage};

/// Below this a channel is treated as constant and left unscaled
const MIN_STD: f64 = 1e-6;

/// Per-channel statistics on the [0, 1] scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: Vec<f32>,
    pub std:  Vec<f32>,
}

impl ChannelStats {
    /// Compute mean/std per channel over every pixel of every image.
    pub fn compute(images: &[RawImage], shape: ImageShape) -> Result<Self> {
        ensure!(!images.is_empty(), "cannot compute statistics of an empty image set");

        let plane    = shape.plane_len();
        let mut sum  = vec![0f64; shape.channels];
        let mut sum2 = vec![0f64; shape.channels];

        for img in images {
            ensure!(
                img.pixels.len() == shape.len(),
                "image has {} values, expected {}",
                img.pixels.len(),
                shape.len()
            );
            for (c, channel) in img.pixels.chunks_exact(plane).enumerate() {
                for &p in channel {
                    let v = p as f64;
                    sum[c]  += v;
                    sum2[c] += v * v;
                }
            }
        }

        let count = (images.len() * plane) as f64;
        let mut mean = Vec::with_capacity(shape.channels);
        let mut std  = Vec::with_capacity(shape.channels);
        for c in 0..shape.channels {
            let m   = sum[c] / count;
            let var = (sum2[c] / count - m * m).max(0.0);
            let s   = var.sqrt() / 255.0;
            if s < MIN_STD {
                tracing::warn!("Channel {} is constant; leaving it unscaled", c);
            }
            mean.push((m / 255.0) as f32);
            std.push(if s < MIN_STD { 1.0 } else { s as f32 });
        }

        Ok(Self { mean, std })
    }
}

/// The transform pipeline shared by all partitions.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stats: ChannelStats,
    shape: ImageShape,
}

impl Normalizer {
    pub fn new(stats: ChannelStats, shape: ImageShape) -> Self {
        Self { stats, shape }
    }

    /// Bytes (CHW) → normalised floats (CHW)
    pub fn apply(&self, pixels: &[u8]) -> Vec<f32> {
        let plane = self.shape.plane_len();
        pixels
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let c = i / plane;
                (p as f32 / 255.0 - self.stats.mean[c]) / self.stats.std[c]
            })
            .collect()
    }
}
