//! Core types and the error taxonomy shared across the dataset crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the dataset crate.
pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// Filesystem error while scanning or reading dataset content.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Discovery found nothing to train on; the run cannot proceed.
    #[error("no files matching '{postfix}' under {path}")]
    Discovery { path: PathBuf, postfix: String },

    /// The age label could not be derived from the file name.
    #[error("cannot derive age from {path}: {msg}")]
    Label { path: PathBuf, msg: String },

    /// Slice decode failure (TIFF and friends).
    #[error("image decode failed for {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Volume decode failure (NIfTI).
    #[error("nifti read failed for {path}: {source}")]
    Nifti {
        path: PathBuf,
        #[source]
        source: nifti::error::NiftiError,
    },

    /// Decoded data is internally inconsistent (bad dimensions, truncated buffer).
    #[error("malformed sample at {path}: {msg}")]
    Malformed { path: PathBuf, msg: String },

    /// A transform rejected the sample.
    #[error("transform failed for subject {subject}: {msg}")]
    Transform { subject: String, msg: String },

    #[error("{0}")]
    Other(String),
}

/// One discovered dataset entry: an image file plus its derived age label.
#[derive(Debug, Clone)]
pub struct Subject {
    /// Full path to the image file.
    pub path: PathBuf,
    /// File name with the dataset postfix stripped; used as the audit identifier.
    pub stem: String,
    /// Age in years, parsed from the file name.
    pub age: f32,
}

/// A transformed 2D slice in channel-first layout (`[1, height, width]`, flattened).
#[derive(Debug, Clone)]
pub struct SliceSample {
    pub pixels: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

/// A transformed 3D volume in channel-first layout (`[1, depth, height, width]`, flattened).
#[derive(Debug, Clone)]
pub struct VolumeSample {
    pub voxels: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}
