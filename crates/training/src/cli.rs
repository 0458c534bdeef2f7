//! Command-line surfaces for the `train2d` and `eval3d` binaries. The arg
//! structs live here so both binaries stay thin and the mapping onto the
//! library configs is testable.

use crate::context::{validate_backend_choice, BackendKind, RunContext};
use crate::eval3d::{run_eval3d, EvalConfig};
use crate::loop2d::{run_train2d, TrainConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "train2d",
    about = "Train the 2D SFCN age regressor on labelled brain slices"
)]
pub struct Train2dArgs {
    /// Directory of slice images named `<subject>_<age><postfix>`.
    #[arg(long, default_value = "data")]
    pub data_dir: String,
    /// Filename postfix selecting dataset files.
    #[arg(long, default_value = ".tiff")]
    pub postfix: String,
    /// Output directory for manifests, checkpoints, metrics, and CSV.
    #[arg(long, default_value = "out")]
    pub out_dir: String,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Accelerator count; ranks pick `rank % devices`.
    #[arg(long, default_value_t = 1)]
    pub devices: usize,
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
    /// Parallel sample loaders per iterator.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    #[arg(long, default_value_t = 50)]
    pub epochs: usize,
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    /// Center-crop edge length.
    #[arg(long, default_value_t = 150)]
    pub crop: usize,
    /// Seed for splitting and per-epoch shuffling.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    /// Cap on discovered subjects (quick runs).
    #[arg(long)]
    pub max_subjects: Option<usize>,
    /// Checkpoint cadence in epochs.
    #[arg(long, default_value_t = 10)]
    pub checkpoint_interval: usize,
    /// Print per-batch losses and sample predictions.
    #[arg(short = 'd', long, default_value_t = false)]
    pub debug: bool,
}

pub fn train2d_from_args(args: Train2dArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let ctx = RunContext::from_env(args.devices, args.debug);
    let cfg = TrainConfig {
        data_dir: PathBuf::from(args.data_dir),
        postfix: args.postfix,
        out_dir: PathBuf::from(args.out_dir),
        batch_size: args.batch_size,
        workers: args.workers,
        epochs: args.epochs,
        lr: args.lr,
        crop: args.crop,
        seed: args.seed,
        max_subjects: args.max_subjects,
        checkpoint_interval: args.checkpoint_interval,
        ..TrainConfig::default()
    };
    run_train2d(&cfg, &ctx)
}

#[derive(Parser, Debug)]
#[command(
    name = "eval3d",
    about = "Evaluate a trained 3D SFCN over NIfTI brain volumes"
)]
pub struct Eval3dArgs {
    /// Directory of volumes named `<subject>_<age><postfix>`.
    #[arg(long, default_value = "data")]
    pub data_dir: String,
    /// Filename postfix selecting dataset files.
    #[arg(long, default_value = ".nii.gz")]
    pub postfix: String,
    /// Trained weights to load.
    #[arg(long)]
    pub checkpoint: String,
    /// Destination for the predictions CSV.
    #[arg(long, default_value = "predictions.csv")]
    pub csv_out: String,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Accelerator count; ranks pick `rank % devices`.
    #[arg(long, default_value_t = 1)]
    pub devices: usize,
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,
    /// Parallel sample loaders per iterator.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    /// Center-crop edge length applied per axis.
    #[arg(long, default_value_t = 150)]
    pub crop: usize,
    /// Cap on discovered subjects (quick runs).
    #[arg(long)]
    pub max_subjects: Option<usize>,
    /// Print per-batch progress.
    #[arg(short = 'd', long, default_value_t = false)]
    pub debug: bool,
}

pub fn eval3d_from_args(args: Eval3dArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;
    let ctx = RunContext::from_env(args.devices, args.debug);
    let cfg = EvalConfig {
        data_dir: PathBuf::from(args.data_dir),
        postfix: args.postfix,
        checkpoint: PathBuf::from(args.checkpoint),
        csv_out: PathBuf::from(args.csv_out),
        batch_size: args.batch_size,
        workers: args.workers,
        crop: args.crop,
        max_subjects: args.max_subjects,
    };
    run_eval3d(&cfg, &ctx)
}
