//! Dataset plumbing for brain-age MRI pipelines.
//!
//! This crate provides:
//! - Directory discovery with filename-derived age labels and mean-age
//!   normalization
//! - A crop / channel-first / normalize transform pipeline for slices and
//!   volumes
//! - Seeded train/validation/test splitting with plain-text manifests
//! - Parallel batch assembly into burn tensors (behind `burn-runtime`)

pub mod discover;
pub mod readers;
pub mod split;
pub mod transform;
pub mod types;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use discover::{discover, AgeScale, Discovery};
pub use split::{
    read_manifest, split_subjects, write_manifests, SplitIndices, TEST_MANIFEST, TRAIN_MANIFEST,
    VALIDATION_MANIFEST,
};
pub use transform::{TransformConfig, TransformPipeline};
pub use types::{DatasetError, DatasetResult, SliceSample, Subject, VolumeSample};

#[cfg(feature = "burn-runtime")]
pub use batch::{BatchIter, LoaderConfig, SliceBatch, VolumeBatch};
