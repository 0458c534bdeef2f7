//! Checkpoint policy and weight persistence.
//!
//! The periodic rule is deliberately narrow: it fires only on epochs that are
//! multiples of the interval, and it compares the loss of the *last*
//! validation batch of that epoch (not an epoch-level mean) against the best
//! value any previous checkpoint recorded. The final weights are saved
//! unconditionally after the last epoch, independent of this rule.

use crate::TrainBackend;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use models::{Sfcn2d, Sfcn2dConfig, Sfcn3d, Sfcn3dConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("checkpoint i/o failed at {path}: {source}")]
pub struct CheckpointIoError {
    pub path: PathBuf,
    #[source]
    pub source: RecorderError,
}

/// True when this epoch should write a periodic checkpoint.
pub fn checkpoint_decision(
    epoch: usize,
    interval: usize,
    last_val_loss: Option<f32>,
    best: f32,
) -> bool {
    match last_val_loss {
        Some(loss) => epoch % interval.max(1) == 0 && loss < best,
        None => false,
    }
}

pub fn epoch_checkpoint_path(out_dir: &Path, epoch: usize) -> PathBuf {
    out_dir.join(format!("epoch_{epoch}_model.bin"))
}

pub fn final_checkpoint_path(out_dir: &Path) -> PathBuf {
    out_dir.join("end_model.bin")
}

/// Serializes any module's weights to `path` in full precision.
pub fn save_weights<B, M>(model: &M, path: &Path) -> Result<(), CheckpointIoError>
where
    B: burn::tensor::backend::Backend,
    M: Module<B> + Clone,
{
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| CheckpointIoError {
            path: path.to_path_buf(),
            source: e,
        })
}

pub fn load_sfcn2d(
    path: &Path,
    device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
) -> Result<Sfcn2d<TrainBackend>, CheckpointIoError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Sfcn2d::<TrainBackend>::new(Sfcn2dConfig::default(), device)
        .load_file(path, &recorder, device)
        .map_err(|e| CheckpointIoError {
            path: path.to_path_buf(),
            source: e,
        })
}

pub fn load_sfcn3d(
    path: &Path,
    device: &<TrainBackend as burn::tensor::backend::Backend>::Device,
) -> Result<Sfcn3d<TrainBackend>, CheckpointIoError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Sfcn3d::<TrainBackend>::new(Sfcn3dConfig::default(), device)
        .load_file(path, &recorder, device)
        .map_err(|e| CheckpointIoError {
            path: path.to_path_buf(),
            source: e,
        })
}
