// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::evaluate_use_case::EvaluateOptions;
use crate::application::train_use_case::{SourceFormat, TrainConfig};
use crate::ml::{device::DeviceKind, trainer::OptimizerKind};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train AlexNet, then test the best checkpoint and plot its errors
    Train(TrainArgs),

    /// Re-test a trained checkpoint and regenerate the plots
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    /// CIFAR-10 binary batches (data_batch_*.bin, test_batch.bin)
    Cifar10,
    /// train/<class>/* and test/<class>/* image directories
    Folder,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OptimizerArg {
    Sgd,
    Adam,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    Auto,
    Gpu,
    Cpu,
}

impl From<FormatArg> for SourceFormat {
    fn from(a: FormatArg) -> Self {
        match a {
            FormatArg::Cifar10 => SourceFormat::Cifar10Binary,
            FormatArg::Folder  => SourceFormat::ImageFolder,
        }
    }
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(a: OptimizerArg) -> Self {
        match a {
            OptimizerArg::Sgd  => OptimizerKind::Sgd,
            OptimizerArg::Adam => OptimizerKind::Adam,
        }
    }
}

impl From<DeviceArg> for DeviceKind {
    fn from(a: DeviceArg) -> Self {
        match a {
            DeviceArg::Auto => DeviceKind::Auto,
            DeviceArg::Gpu  => DeviceKind::Gpu,
            DeviceArg::Cpu  => DeviceKind::Cpu,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset root (CIFAR-10 batches or an image folder tree)
    #[arg(long, default_value = "data")]
    pub source_path: String,

    #[arg(long, value_enum, default_value_t = FormatArg::Cifar10)]
    pub format: FormatArg,

    /// Number of images processed together in one forward pass
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Fraction of the training pool kept for training; the
    /// rest becomes the validation set
    #[arg(long, default_value_t = 0.8)]
    pub split_ratio: f64,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Where the best model is saved (extension chosen automatically)
    #[arg(long, default_value = "save_trained_model/AlexNet")]
    pub checkpoint_path: String,

    /// Learning rate [default: 0.01 for SGD, 0.001 for Adam]
    #[arg(long)]
    pub lr: Option<f64>,

    /// Momentum for SGD (ignored by Adam)
    #[arg(long, default_value_t = 0.5)]
    pub momentum: f64,

    #[arg(long, value_enum, default_value_t = OptimizerArg::Sgd)]
    pub optimizer: OptimizerArg,

    /// Seed for the train/validation split and shuffling.
    /// A random one is drawn (and logged) if omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// How many misclassified test images to plot
    #[arg(long, default_value_t = 25)]
    pub preview_count: usize,

    /// Resize folder images to this square size (multiple of 16)
    #[arg(long, default_value_t = 32)]
    pub image_size: usize,

    /// Dropout probability in the classifier head
    #[arg(long, default_value_t = 0.5)]
    pub dropout: f64,

    /// Directory for the confusion matrix and error grid
    #[arg(long, default_value = "plots")]
    pub output_dir: String,

    #[arg(long, value_enum, default_value_t = DeviceArg::Auto)]
    pub device: DeviceArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let optimizer = OptimizerKind::from(a.optimizer);
        TrainConfig {
            source_path:     a.source_path,
            source_format:   a.format.into(),
            batch_size:      a.batch_size,
            split_ratio:     a.split_ratio,
            epoch_count:     a.epochs,
            checkpoint_path: a.checkpoint_path,
            learning_rate:   a.lr.unwrap_or(optimizer.default_learning_rate()),
            momentum:        a.momentum,
            optimizer,
            seed:            a.seed,
            preview_count:   a.preview_count,
            image_size:      a.image_size,
            dropout:         a.dropout,
            output_dir:      a.output_dir,
            device:          a.device.into(),
        }
    }
}

/// All arguments for the `evaluate` command.
/// Anything left out is taken from the saved training config.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Checkpoint written by `train`
    #[arg(long, default_value = "save_trained_model/AlexNet")]
    pub checkpoint_path: String,

    #[arg(long)]
    pub source_path: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub preview_count: Option<usize>,

    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,
}

impl From<EvaluateArgs> for EvaluateOptions {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateOptions {
            checkpoint_path: a.checkpoint_path,
            source_path:     a.source_path,
            batch_size:      a.batch_size,
            preview_count:   a.preview_count,
            output_dir:      a.output_dir,
            device:          a.device.map(Into::into),
        }
    }
}
