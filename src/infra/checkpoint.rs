// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the best model weights plus the run files
// an `evaluate` run needs to rebuild everything.
//
// Files, for checkpoint_path = "checkpoints/alexnet":
//
//   checkpoints/
//     alexnet.bin           ← best weights (BinBytesRecorder, f32)
//     alexnet.json          ← epoch / loss / accuracy of those weights
//     train_config.json     ← run configuration
//     normalization.json    ← per-channel mean/std of the train pool
//
// Weights are recorded at full precision so a reloaded model
// computes exactly what the saved one did.
//
// Every write goes to a "<file name>.partial" sibling first and
// is then renamed over the target. A crash mid-write therefore
// leaves the previous best checkpoint intact.

use anyhow::{ensure, Context, Result};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::normalizer::ChannelStats;
use crate::ml::model::AlexNet;

type CheckpointRecorder = BinBytesRecorder<FullPrecisionSettings>;

const MODEL_EXT:   &str = "bin";
const META_EXT:    &str = "json";
const CONFIG_FILE: &str = "train_config.json";
const STATS_FILE:  &str = "normalization.json";

/// What the persisted weights scored when they were saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:          usize,
    pub valid_loss:     f64,
    pub valid_accuracy: f64,
}

/// Manages the single best-model checkpoint and its companion files.
pub struct CheckpointManager {
    /// File name without its last extension, e.g. "alexnet" or "AlexNet.best"
    name: String,
    dir:  PathBuf,
}

impl CheckpointManager {
    /// Manager for writing: the parent directory is created if missing.
    ///
    /// Only the last extension of `checkpoint_path` is dropped;
    /// "AlexNet.best.pt" stores its weights in "AlexNet.best.bin".
    pub fn new(checkpoint_path: impl AsRef<Path>) -> Result<Self> {
        let manager = Self::locate(checkpoint_path.as_ref())?;
        fs::create_dir_all(&manager.dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", manager.dir.display()))?;
        Ok(manager)
    }

    /// Manager for reading an existing run; never touches the filesystem
    /// beyond checking that the directory exists.
    pub fn open(checkpoint_path: impl AsRef<Path>) -> Result<Self> {
        let manager = Self::locate(checkpoint_path.as_ref())?;
        ensure!(
            manager.dir.is_dir(),
            "Checkpoint directory '{}' does not exist. Have you trained the model first?",
            manager.dir.display()
        );
        Ok(manager)
    }

    fn locate(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .with_context(|| format!("Checkpoint path '{}' has no file name", path.display()))?
            .to_string_lossy()
            .to_string();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self { name, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the weights file
    pub fn model_file(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, MODEL_EXT))
    }

    fn best_file(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, META_EXT))
    }

    /// Persist `model` as the new best checkpoint.
    pub fn save_model<B: Backend>(&self, model: &AlexNet<B>, best: &BestCheckpoint) -> Result<()> {
        let path  = self.model_file();
        let bytes = CheckpointRecorder::default()
            .record(model.clone().into_record(), ())
            .context("Failed to serialise model parameters")?;

        write_atomic(&path, &bytes)?;
        write_json_atomic(&self.best_file(), best)?;

        tracing::debug!("Saved checkpoint: epoch {} -> {}", best.epoch, path.display());
        Ok(())
    }

    /// Load the best weights into `model`, replacing all of its parameters.
    pub fn load_model<B: Backend>(&self, model: AlexNet<B>, device: &B::Device) -> Result<AlexNet<B>> {
        let path  = self.model_file();
        let bytes = fs::read(&path).with_context(|| {
            format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
        })?;

        let record = CheckpointRecorder::default()
            .load(bytes, device)
            .with_context(|| format!("Checkpoint '{}' is corrupt", path.display()))?;

        Ok(model.load_record(record))
    }

    pub fn load_best(&self) -> Result<BestCheckpoint> {
        read_json(&self.best_file())
    }

    /// Save the run configuration so `evaluate` can rebuild the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        write_json_atomic(&self.dir.join(CONFIG_FILE), cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        read_json(&self.dir.join(CONFIG_FILE))
            .context("Make sure you have run 'train' before 'evaluate'.")
    }

    pub fn save_stats(&self, stats: &ChannelStats) -> Result<()> {
        write_json_atomic(&self.dir.join(STATS_FILE), stats)
    }

    pub fn load_stats(&self) -> Result<ChannelStats> {
        read_json(&self.dir.join(STATS_FILE))
    }
}

/// `<path>.partial`, appended to the whole file name so no extension is lost
fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_os_string();
    partial.push(".partial");
    PathBuf::from(partial)
}

/// Write `bytes` to `<path>.partial`, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(path);
    fs::write(&partial, bytes)
        .with_context(|| format!("Cannot write '{}'", partial.display()))?;
    fs::rename(&partial, path)
        .with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, serde_json::to_string_pretty(value)?.as_bytes())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse '{}'", path.display()))
}
