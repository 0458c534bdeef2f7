//! Per-sample transform pipeline.
//!
//! Order is fixed: spatial center crop, channel-first reshape, then intensity
//! normalization. Cropping happens first so the normalization statistics never
//! include padding; the channel axis is added before normalization so every
//! later stage sees the canonical layout. Each transform is a pure function of
//! one sample and holds no state across samples.

use crate::readers::{RawSlice, RawVolume};
use crate::types::{DatasetError, DatasetResult, SliceSample, VolumeSample};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Edge length of the center crop, applied per spatial axis.
    pub crop: usize,
    /// Zero-mean/unit-variance intensity normalization.
    pub normalize: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            crop: 150,
            normalize: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    cfg: TransformConfig,
}

impl TransformPipeline {
    pub fn from_config(cfg: &TransformConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn crop(&self) -> usize {
        self.cfg.crop
    }

    /// Human-readable stage summary for startup logs.
    pub fn describe(&self) -> String {
        let mut stages = vec![format!("center-crop {}", self.cfg.crop), "channel-first".to_string()];
        if self.cfg.normalize {
            stages.push("normalize".to_string());
        }
        stages.join(" -> ")
    }

    /// Crops, reshapes to `[1, crop, crop]`, and normalizes one 2D slice.
    pub fn apply_slice(&self, raw: RawSlice, subject: &str) -> DatasetResult<SliceSample> {
        if raw.pixels.len() != raw.width * raw.height {
            return Err(DatasetError::Transform {
                subject: subject.to_string(),
                msg: format!(
                    "pixel buffer holds {} values for {}x{}",
                    raw.pixels.len(),
                    raw.width,
                    raw.height
                ),
            });
        }
        let c = self.cfg.crop;
        let mut pixels = center_crop_2d(&raw.pixels, raw.width, raw.height, c);
        if self.cfg.normalize {
            normalize_intensity(&mut pixels);
        }
        Ok(SliceSample {
            pixels,
            width: c,
            height: c,
        })
    }

    /// Crops, reshapes to `[1, crop, crop, crop]`, and normalizes one 3D volume.
    pub fn apply_volume(&self, raw: RawVolume, subject: &str) -> DatasetResult<VolumeSample> {
        if raw.voxels.len() != raw.width * raw.height * raw.depth {
            return Err(DatasetError::Transform {
                subject: subject.to_string(),
                msg: format!(
                    "voxel buffer holds {} values for {}x{}x{}",
                    raw.voxels.len(),
                    raw.width,
                    raw.height,
                    raw.depth
                ),
            });
        }
        let c = self.cfg.crop;
        let mut voxels = center_crop_3d(&raw.voxels, raw.width, raw.height, raw.depth, c);
        if self.cfg.normalize {
            normalize_intensity(&mut voxels);
        }
        Ok(VolumeSample {
            voxels,
            width: c,
            height: c,
            depth: c,
        })
    }
}

/// Center crop to `crop`x`crop`; out-of-bounds regions (input smaller than the
/// crop) are zero-filled.
fn center_crop_2d(pixels: &[f32], width: usize, height: usize, crop: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; crop * crop];
    let off_y = height as isize - crop as isize;
    let off_x = width as isize - crop as isize;
    let off_y = off_y.div_euclid(2);
    let off_x = off_x.div_euclid(2);
    for yy in 0..crop {
        let sy = yy as isize + off_y;
        if sy < 0 || sy >= height as isize {
            continue;
        }
        for xx in 0..crop {
            let sx = xx as isize + off_x;
            if sx < 0 || sx >= width as isize {
                continue;
            }
            out[yy * crop + xx] = pixels[sy as usize * width + sx as usize];
        }
    }
    out
}

/// 3D center crop over `[depth][height][width]`-ordered voxels, zero-filled.
fn center_crop_3d(voxels: &[f32], width: usize, height: usize, depth: usize, crop: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; crop * crop * crop];
    let off_z = (depth as isize - crop as isize).div_euclid(2);
    let off_y = (height as isize - crop as isize).div_euclid(2);
    let off_x = (width as isize - crop as isize).div_euclid(2);
    for zz in 0..crop {
        let sz = zz as isize + off_z;
        if sz < 0 || sz >= depth as isize {
            continue;
        }
        for yy in 0..crop {
            let sy = yy as isize + off_y;
            if sy < 0 || sy >= height as isize {
                continue;
            }
            for xx in 0..crop {
                let sx = xx as isize + off_x;
                if sx < 0 || sx >= width as isize {
                    continue;
                }
                out[(zz * crop + yy) * crop + xx] =
                    voxels[(sz as usize * height + sy as usize) * width + sx as usize];
            }
        }
    }
    out
}

/// In-place zero-mean/unit-variance. A constant buffer becomes all zeros
/// rather than dividing by a zero deviation.
fn normalize_intensity(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = var.sqrt();
    let denom = if std > 1e-8 { std } else { 1.0 };
    for v in values.iter_mut() {
        *v = ((*v as f64 - mean) / denom) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(crop: usize, normalize: bool) -> TransformPipeline {
        TransformPipeline::from_config(&TransformConfig { crop, normalize })
    }

    #[test]
    fn crop_extracts_center_region() {
        // 4x4 ramp; center 2x2 is rows 1..3, cols 1..3.
        let pixels: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let out = center_crop_2d(&pixels, 4, 4, 2);
        assert_eq!(out, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn crop_pads_small_inputs_with_zeros() {
        let pixels = vec![1.0f32, 2.0, 3.0, 4.0]; // 2x2
        let out = center_crop_2d(&pixels, 2, 2, 4);
        assert_eq!(out.len(), 16);
        // Input lands centered; corners stay zero.
        assert_eq!(out[0], 0.0);
        assert_eq!(out[15], 0.0);
        let sum: f32 = out.iter().sum();
        assert!((sum - 10.0).abs() < 1e-6);
    }

    #[test]
    fn crop_3d_keeps_center_voxel() {
        let mut voxels = vec![0.0f32; 5 * 5 * 5];
        voxels[(2 * 5 + 2) * 5 + 2] = 9.0; // dead center
        let out = center_crop_3d(&voxels, 5, 5, 5, 3);
        assert_eq!(out[(1 * 3 + 1) * 3 + 1], 9.0);
    }

    #[test]
    fn normalize_produces_zero_mean_unit_variance() {
        let mut values = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
        normalize_intensity(&mut values);
        let mean: f32 = values.iter().sum::<f32>() / 5.0;
        let var: f32 = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 5.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn normalize_handles_constant_input() {
        let mut values = vec![7.0f32; 9];
        normalize_intensity(&mut values);
        assert!(values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn slice_transform_checks_buffer_shape() {
        let raw = RawSlice {
            pixels: vec![0.0; 5],
            width: 2,
            height: 2,
        };
        let err = pipeline(2, true).apply_slice(raw, "s1").unwrap_err();
        assert!(matches!(err, DatasetError::Transform { .. }));
    }

    #[test]
    fn slice_transform_outputs_crop_shape() {
        let raw = RawSlice {
            pixels: (0..36).map(|v| v as f32).collect(),
            width: 6,
            height: 6,
        };
        let out = pipeline(4, true).apply_slice(raw, "s1").unwrap();
        assert_eq!(out.pixels.len(), 16);
        assert_eq!((out.width, out.height), (4, 4));
    }

    #[test]
    fn describe_lists_stages_in_order() {
        let p = pipeline(150, true);
        assert_eq!(p.describe(), "center-crop 150 -> channel-first -> normalize");
    }
}
