//! Batch iteration: shuffled subject order, parallel sample loading, tensor
//! assembly.
//!
//! The iterator walks its subject list once; training code constructs a fresh
//! iterator per epoch (with a per-epoch seed) to reshuffle. Sample loading
//! fans out over a dedicated rayon pool so file I/O and transforms overlap the
//! compute loop. Any load or transform failure aborts iteration with the
//! offending subject's error; there is no skip-and-continue mode.

use crate::discover::AgeScale;
use crate::readers::{read_slice, read_volume};
use crate::transform::TransformPipeline;
use crate::types::{DatasetError, DatasetResult, SliceSample, Subject, VolumeSample};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// Loader knobs; every component receives these explicitly at construction.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Shuffle subject order before iterating.
    pub shuffle: bool,
    /// Shuffle seed; `None` draws from thread entropy.
    pub seed: Option<u64>,
    /// Discard a trailing batch smaller than the requested size.
    pub drop_last: bool,
    /// Worker threads for sample loading; 0 or 1 loads serially on the
    /// calling thread.
    pub workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            shuffle: true,
            seed: None,
            drop_last: false,
            workers: 4,
        }
    }
}

/// One 2D batch: images `[n, 1, crop, crop]`, normalized ages `[n, 1]`.
pub struct SliceBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 2>,
}

/// One 3D batch: images `[n, 1, crop, crop, crop]`, normalized ages `[n, 1]`.
pub struct VolumeBatch<B: Backend> {
    pub images: Tensor<B, 5>,
    pub targets: Tensor<B, 2>,
}

pub struct BatchIter {
    subjects: Vec<Subject>,
    cursor: usize,
    pipeline: TransformPipeline,
    scale: AgeScale,
    pool: Option<rayon::ThreadPool>,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    drop_last: bool,
    image_buf: Vec<f32>,
    target_buf: Vec<f32>,
}

impl BatchIter {
    /// Builds an iterator over `subjects`, shuffling up front when configured.
    pub fn new(
        mut subjects: Vec<Subject>,
        scale: AgeScale,
        pipeline: TransformPipeline,
        cfg: &LoaderConfig,
    ) -> DatasetResult<Self> {
        if cfg.shuffle {
            let mut rng = match cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            subjects.shuffle(&mut rng);
        }
        let pool = if cfg.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.workers)
                .build()
                .map_err(|e| DatasetError::Other(format!("loader pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        let log_every_samples = match std::env::var("MRI_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let now = Instant::now();
        Ok(Self {
            subjects,
            cursor: 0,
            pipeline,
            scale,
            pool,
            processed_samples: 0,
            processed_batches: 0,
            started: now,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            drop_last: cfg.drop_last,
            image_buf: Vec::new(),
            target_buf: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Next 2D batch, or `None` once the subject list is exhausted.
    pub fn next_slices<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<SliceBatch<B>>> {
        let batch_size = batch_size.max(1);
        if self.cursor >= self.subjects.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.subjects.len());
        let slice = &self.subjects[self.cursor..end];
        self.cursor = end;
        if self.drop_last && slice.len() < batch_size {
            return Ok(None);
        }

        let pipeline = &self.pipeline;
        let mut loaded: Vec<(usize, DatasetResult<SliceSample>)> = match &self.pool {
            Some(pool) => pool.install(|| {
                slice
                    .par_iter()
                    .enumerate()
                    .map(|(i, subject)| (i, load_slice_sample(subject, pipeline)))
                    .collect()
            }),
            None => slice
                .iter()
                .enumerate()
                .map(|(i, subject)| (i, load_slice_sample(subject, pipeline)))
                .collect(),
        };
        loaded.sort_by_key(|(i, _)| *i);

        self.image_buf.clear();
        self.target_buf.clear();
        for ((_, result), subject) in loaded.into_iter().zip(slice.iter()) {
            let sample = result?;
            self.image_buf.extend_from_slice(&sample.pixels);
            self.target_buf.push(self.scale.normalize(subject.age));
        }

        let n = slice.len();
        let c = self.pipeline.crop();
        let images = Tensor::<B, 1>::from_floats(self.image_buf.as_slice(), device)
            .reshape([n, 1, c, c]);
        let targets =
            Tensor::<B, 1>::from_floats(self.target_buf.as_slice(), device).reshape([n, 1]);

        self.processed_samples += n;
        self.processed_batches += 1;
        self.maybe_log_progress();
        Ok(Some(SliceBatch { images, targets }))
    }

    /// Next 3D batch, or `None` once the subject list is exhausted.
    pub fn next_volumes<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<VolumeBatch<B>>> {
        let batch_size = batch_size.max(1);
        if self.cursor >= self.subjects.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.subjects.len());
        let slice = &self.subjects[self.cursor..end];
        self.cursor = end;
        if self.drop_last && slice.len() < batch_size {
            return Ok(None);
        }

        let pipeline = &self.pipeline;
        let mut loaded: Vec<(usize, DatasetResult<VolumeSample>)> = match &self.pool {
            Some(pool) => pool.install(|| {
                slice
                    .par_iter()
                    .enumerate()
                    .map(|(i, subject)| (i, load_volume_sample(subject, pipeline)))
                    .collect()
            }),
            None => slice
                .iter()
                .enumerate()
                .map(|(i, subject)| (i, load_volume_sample(subject, pipeline)))
                .collect(),
        };
        loaded.sort_by_key(|(i, _)| *i);

        self.image_buf.clear();
        self.target_buf.clear();
        for ((_, result), subject) in loaded.into_iter().zip(slice.iter()) {
            let sample = result?;
            self.image_buf.extend_from_slice(&sample.voxels);
            self.target_buf.push(self.scale.normalize(subject.age));
        }

        let n = slice.len();
        let c = self.pipeline.crop();
        let images = Tensor::<B, 1>::from_floats(self.image_buf.as_slice(), device)
            .reshape([n, 1, c, c, c]);
        let targets =
            Tensor::<B, 1>::from_floats(self.target_buf.as_slice(), device).reshape([n, 1]);

        self.processed_samples += n;
        self.processed_batches += 1;
        self.maybe_log_progress();
        Ok(Some(VolumeBatch { images, targets }))
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let since_last = self.last_log.elapsed();
        if processed_since < threshold && since_last < Duration::from_secs(30) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let rate = self.processed_samples as f32 / secs;
        eprintln!(
            "[dataset] batches={} samples={} elapsed={:.1}s rate={:.1} img/s",
            self.processed_batches, self.processed_samples, secs, rate
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}

fn load_slice_sample(subject: &Subject, pipeline: &TransformPipeline) -> DatasetResult<SliceSample> {
    let raw = read_slice(&subject.path)?;
    pipeline.apply_slice(raw, &subject.stem)
}

fn load_volume_sample(
    subject: &Subject,
    pipeline: &TransformPipeline,
) -> DatasetResult<VolumeSample> {
    let raw = read_volume(&subject.path)?;
    pipeline.apply_volume(raw, &subject.stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::discover;
    use crate::transform::TransformConfig;
    use burn_ndarray::NdArray;
    use std::path::Path;

    type TestBackend = NdArray<f32>;

    fn synthetic_slices(dir: &Path, count: usize) {
        for i in 0..count {
            let age = 60 + i;
            let path = dir.join(format!("s{i:03}_{age}.tiff"));
            let img = image::GrayImage::from_fn(8, 8, |x, y| {
                image::Luma([((x * 7 + y * 13 + i as u32) % 256) as u8])
            });
            img.save(path).unwrap();
        }
    }

    fn iter_over(dir: &Path, cfg: &LoaderConfig, crop: usize) -> BatchIter {
        let d = discover(dir, ".tiff", None).unwrap();
        let pipeline = TransformPipeline::from_config(&TransformConfig {
            crop,
            normalize: true,
        });
        BatchIter::new(d.subjects, d.scale, pipeline, cfg).unwrap()
    }

    #[test]
    fn batches_cover_all_subjects_in_order_without_shuffle() {
        let dir = tempfile::tempdir().unwrap();
        synthetic_slices(dir.path(), 5);
        let cfg = LoaderConfig {
            shuffle: false,
            workers: 2,
            ..Default::default()
        };
        let mut iter = iter_over(dir.path(), &cfg, 6);
        let device = Default::default();

        let sizes = [2usize, 2, 1];
        for expected in sizes {
            let batch = iter.next_slices::<TestBackend>(2, &device).unwrap().unwrap();
            assert_eq!(batch.images.dims(), [expected, 1, 6, 6]);
            assert_eq!(batch.targets.dims(), [expected, 1]);
        }
        assert!(iter.next_slices::<TestBackend>(2, &device).unwrap().is_none());
    }

    #[test]
    fn targets_are_normalized_ages() {
        let dir = tempfile::tempdir().unwrap();
        synthetic_slices(dir.path(), 3); // ages 60, 61, 62; mean 61
        let cfg = LoaderConfig {
            shuffle: false,
            workers: 0,
            ..Default::default()
        };
        let mut iter = iter_over(dir.path(), &cfg, 4);
        let device = Default::default();
        let batch = iter.next_slices::<TestBackend>(3, &device).unwrap().unwrap();
        let targets: Vec<f32> = batch.targets.into_data().to_vec().unwrap();
        let expected = [60.0f32 / 61.0, 61.0 / 61.0, 62.0 / 61.0];
        for (got, want) in targets.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-5, "{got} vs {want}");
        }
    }

    #[test]
    fn drop_last_discards_short_tail() {
        let dir = tempfile::tempdir().unwrap();
        synthetic_slices(dir.path(), 5);
        let cfg = LoaderConfig {
            shuffle: false,
            drop_last: true,
            workers: 0,
            ..Default::default()
        };
        let mut iter = iter_over(dir.path(), &cfg, 4);
        let device = Default::default();
        assert!(iter.next_slices::<TestBackend>(2, &device).unwrap().is_some());
        assert!(iter.next_slices::<TestBackend>(2, &device).unwrap().is_some());
        assert!(iter.next_slices::<TestBackend>(2, &device).unwrap().is_none());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        synthetic_slices(dir.path(), 8);
        let cfg = LoaderConfig {
            shuffle: true,
            seed: Some(9),
            workers: 0,
            ..Default::default()
        };
        let device = Default::default();

        let mut first = Vec::new();
        let mut iter = iter_over(dir.path(), &cfg, 4);
        while let Some(batch) = iter.next_slices::<TestBackend>(3, &device).unwrap() {
            first.extend(batch.targets.into_data().to_vec::<f32>().unwrap());
        }
        let mut second = Vec::new();
        let mut iter = iter_over(dir.path(), &cfg, 4);
        while let Some(batch) = iter.next_slices::<TestBackend>(3, &device).unwrap() {
            second.extend(batch.targets.into_data().to_vec::<f32>().unwrap());
        }
        assert_eq!(first.len(), 8);
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_file_aborts_iteration() {
        let dir = tempfile::tempdir().unwrap();
        synthetic_slices(dir.path(), 2);
        std::fs::write(dir.path().join("s999_70.tiff"), b"garbage").unwrap();
        let cfg = LoaderConfig {
            shuffle: false,
            workers: 2,
            ..Default::default()
        };
        let mut iter = iter_over(dir.path(), &cfg, 4);
        let device = Default::default();
        let mut saw_error = false;
        for _ in 0..3 {
            match iter.next_slices::<TestBackend>(2, &device) {
                Err(e) => {
                    assert!(matches!(e, DatasetError::Image { .. }));
                    saw_error = true;
                    break;
                }
                Ok(None) => break,
                Ok(Some(_)) => {}
            }
        }
        assert!(saw_error);
    }
}
