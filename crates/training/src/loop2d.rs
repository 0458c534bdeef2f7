//! The 2D slice pipeline: discovery, split, per-epoch train/validate loops,
//! periodic checkpointing, final weights, held-out test pass, CSV export.

use crate::checkpoint::{
    checkpoint_decision, epoch_checkpoint_path, final_checkpoint_path, save_weights,
};
use crate::context::RunContext;
use crate::export::PredictionTable;
use crate::metrics::{EpochAccumulator, ScalarLog};
use crate::{backend_device, AutodiffTrainBackend, TrainBackend};
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use models::{Sfcn2d, Sfcn2dConfig};
use mri_dataset::{
    discover, split_subjects, write_manifests, BatchIter, LoaderConfig, Subject, TransformConfig,
    TransformPipeline,
};
use std::path::PathBuf;

/// Everything the 2D pipeline needs, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Directory of age-labelled slice files.
    pub data_dir: PathBuf,
    /// Filename postfix selecting dataset files.
    pub postfix: String,
    /// Output directory for manifests, checkpoints, metrics, and CSV.
    pub out_dir: PathBuf,
    /// Batching granularity.
    pub batch_size: usize,
    /// I/O parallelism per loader.
    pub workers: usize,
    pub epochs: usize,
    pub lr: f64,
    /// Center-crop edge length.
    pub crop: usize,
    /// Seed for splitting and per-epoch shuffling.
    pub seed: u64,
    /// Optional cap on discovered subjects.
    pub max_subjects: Option<usize>,
    /// Periodic checkpoint cadence in epochs.
    pub checkpoint_interval: usize,
    /// Train/validation/test shares.
    pub split_ratios: [f32; 3],
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            postfix: ".tiff".to_string(),
            out_dir: PathBuf::from("out"),
            batch_size: 16,
            workers: 4,
            epochs: 50,
            lr: 1e-4,
            crop: 150,
            seed: 1,
            max_subjects: None,
            checkpoint_interval: 10,
            split_ratios: [0.8, 0.1, 0.1],
        }
    }
}

/// Runs the whole 2D pipeline. Only the main rank writes files; every rank
/// computes the same split and checkpoint decisions from the shared seed.
pub fn run_train2d(cfg: &TrainConfig, ctx: &RunContext) -> anyhow::Result<()> {
    let discovery = discover(&cfg.data_dir, &cfg.postfix, cfg.max_subjects)?;
    let scale = discovery.scale;
    let subjects = discovery.subjects;
    let splits = split_subjects(subjects.len(), cfg.split_ratios, cfg.seed)?;
    println!(
        "discovered {} subjects (mean age {:.2}): train {}, validation {}, test {}",
        subjects.len(),
        scale.mean_age(),
        splits.train.len(),
        splits.validation.len(),
        splits.test.len()
    );

    if ctx.is_main() {
        std::fs::create_dir_all(&cfg.out_dir)?;
        write_manifests(&cfg.out_dir, &subjects, &splits)?;
    }

    let pick = |indices: &[usize]| -> Vec<Subject> {
        indices.iter().map(|&i| subjects[i].clone()).collect()
    };
    let train_subjects = pick(&splits.train);
    let val_subjects = pick(&splits.validation);
    let test_subjects = pick(&splits.test);

    let pipeline = TransformPipeline::from_config(&TransformConfig {
        crop: cfg.crop,
        normalize: true,
    });
    if ctx.debug {
        println!("transforms: {}", pipeline.describe());
    }

    let device = backend_device(ctx);
    println!(
        "rank {}/{} using device {}",
        ctx.rank, ctx.world_size, ctx.device_index
    );
    let mut model = Sfcn2d::<AutodiffTrainBackend>::new(Sfcn2dConfig::default(), &device);
    let mut optim = AdamConfig::new().init();
    let log = ScalarLog::new(&cfg.out_dir);

    let decay_every = (cfg.epochs / 3).max(1);
    let batch_size = cfg.batch_size.max(1);
    let mut best_val = f32::INFINITY;

    for epoch in 0..cfg.epochs {
        let lr = step_decay(cfg.lr, epoch, decay_every);
        let epoch_seed = cfg.seed.wrapping_add(epoch as u64);

        let mut train_mse = EpochAccumulator::default();
        let mut iter = BatchIter::new(
            train_subjects.clone(),
            scale,
            pipeline.clone(),
            &LoaderConfig {
                shuffle: true,
                seed: Some(epoch_seed),
                drop_last: false,
                workers: cfg.workers,
            },
        )?;
        loop {
            let batch = match iter.next_slices::<AutodiffTrainBackend>(batch_size, &device)? {
                Some(batch) => batch,
                None => break,
            };
            let preds = model.forward(batch.images);
            let mse = MseLoss::new();
            let loss = mse.forward(preds, batch.targets, Reduction::Mean);
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);
            train_mse.push(scalar(loss_detached));
            if ctx.debug {
                println!(
                    "epoch {epoch} train batch {}: mse {:.5}",
                    train_mse.len(),
                    train_mse.last().unwrap_or(0.0)
                );
            }
        }

        let valid_model = model.valid();
        let mut val_mse = EpochAccumulator::default();
        let mut val_mae = EpochAccumulator::default();
        let mut baseline_mae = EpochAccumulator::default();
        let mut iter = BatchIter::new(
            val_subjects.clone(),
            scale,
            pipeline.clone(),
            &LoaderConfig {
                shuffle: true,
                seed: Some(epoch_seed),
                drop_last: false,
                workers: cfg.workers,
            },
        )?;
        loop {
            let batch = match iter.next_slices::<TrainBackend>(batch_size, &device)? {
                Some(batch) => batch,
                None => break,
            };
            let preds = valid_model.forward(batch.images);
            let mse = MseLoss::new();
            val_mse.push(scalar(mse.forward(
                preds.clone(),
                batch.targets.clone(),
                Reduction::Mean,
            )));
            val_mae.push(scalar((preds.clone() - batch.targets.clone()).abs().mean()));
            // Baseline compares real ages against the dataset mean, so the
            // targets are denormalized first.
            let base = batch
                .targets
                .clone()
                .mul_scalar(scale.mean_age())
                .sub_scalar(scale.mean_age())
                .abs()
                .mean();
            baseline_mae.push(scalar(base));
            if ctx.debug {
                let p: Vec<f32> = preds.into_data().to_vec().unwrap_or_default();
                let t: Vec<f32> = batch.targets.into_data().to_vec().unwrap_or_default();
                if let (Some(p0), Some(t0)) = (p.first(), t.first()) {
                    println!(
                        "epoch {epoch} val sample: predicted {:.1}, true {:.1}",
                        scale.denormalize(*p0),
                        scale.denormalize(*t0)
                    );
                }
            }
        }

        println!(
            "epoch {epoch}: train mse {:.5} val mse {:.5} val mae {:.5} baseline mae {:.2} lr {lr:.2e}",
            train_mse.mean(),
            val_mse.mean(),
            val_mae.mean(),
            baseline_mae.mean(),
        );
        if ctx.is_main() {
            let record = serde_json::json!({
                "epoch": epoch,
                "lr": lr,
                "train_mse": train_mse.mean(),
                "val_mse": val_mse.mean(),
                "val_mae": val_mae.mean(),
                "baseline_mae": baseline_mae.mean(),
            });
            if let Err(e) = log.append(&record) {
                eprintln!("failed to append metrics: {e}");
            }
        }

        // Compares the last validation batch only, not the epoch mean.
        let last_val = val_mse.last();
        if checkpoint_decision(epoch, cfg.checkpoint_interval, last_val, best_val) {
            if let Some(loss) = last_val {
                if ctx.is_main() {
                    let path = epoch_checkpoint_path(&cfg.out_dir, epoch);
                    save_weights::<AutodiffTrainBackend, _>(&model, &path)?;
                    println!(
                        "checkpoint: epoch {epoch} val batch mse {loss:.5} -> {}",
                        path.display()
                    );
                }
                best_val = loss;
            }
        }
    }

    if ctx.is_main() {
        let path = final_checkpoint_path(&cfg.out_dir);
        save_weights::<AutodiffTrainBackend, _>(&model, &path)?;
        println!("saved final weights to {}", path.display());
    }

    let test_model = model.valid();
    let mut table = PredictionTable::default();
    let mut iter = BatchIter::new(
        test_subjects,
        scale,
        pipeline,
        &LoaderConfig {
            shuffle: false,
            seed: None,
            drop_last: false,
            workers: cfg.workers,
        },
    )?;
    loop {
        let batch = match iter.next_slices::<TrainBackend>(batch_size, &device)? {
            Some(batch) => batch,
            None => break,
        };
        let preds = test_model.forward(batch.images);
        let p: Vec<f32> = preds.into_data().to_vec().unwrap_or_default();
        let t: Vec<f32> = batch.targets.into_data().to_vec().unwrap_or_default();
        for (pv, tv) in p.iter().zip(t.iter()) {
            table.push(
                scale.denormalize(*tv),
                scale.denormalize(*pv),
                scale.mean_age(),
            );
        }
    }
    println!(
        "test: {} samples, mae {:.3} mse {:.3} baseline mae {:.3}",
        table.len(),
        table.mae(),
        table.mse(),
        table.baseline_mae()
    );
    if ctx.is_main() {
        let csv_path = cfg.out_dir.join("predictions.csv");
        table.write_csv(&csv_path)?;
        println!("wrote predictions to {}", csv_path.display());
    }

    Ok(())
}

/// Step decay: one tenth every `decay_every` epochs.
fn step_decay(base: f64, epoch: usize, decay_every: usize) -> f64 {
    base * 0.1f64.powi((epoch / decay_every.max(1)) as i32)
}

fn scalar<B: burn::tensor::backend::Backend>(value: Tensor<B, 1>) -> f32 {
    value
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lr_decays_by_tenths_in_three_phases() {
        // 50 epochs -> decay every 16.
        let decay_every = (50usize / 3).max(1);
        assert_eq!(decay_every, 16);
        assert!((step_decay(1e-4, 0, decay_every) - 1e-4).abs() < 1e-12);
        assert!((step_decay(1e-4, 15, decay_every) - 1e-4).abs() < 1e-12);
        assert!((step_decay(1e-4, 16, decay_every) - 1e-5).abs() < 1e-12);
        assert!((step_decay(1e-4, 32, decay_every) - 1e-6).abs() < 1e-12);
        assert!((step_decay(1e-4, 48, decay_every) - 1e-7).abs() < 1e-13);
    }

    #[test]
    fn defaults_match_the_production_run() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.crop, 150);
        assert_eq!(cfg.seed, 1);
        assert_eq!(cfg.checkpoint_interval, 10);
        assert_eq!(cfg.split_ratios, [0.8, 0.1, 0.1]);
        assert!((cfg.lr - 1e-4).abs() < 1e-12);
    }
}
