//! File readers: 2D TIFF slices via `image`, 3D NIfTI volumes via `nifti`.

use crate::types::{DatasetError, DatasetResult};
use nifti::volume::{NiftiVolume, RandomAccessNiftiVolume};
use nifti::{NiftiObject, ReaderOptions};
use std::path::Path;

/// Decoded slice before any transform, grayscale row-major.
#[derive(Debug, Clone)]
pub struct RawSlice {
    pub pixels: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

/// Decoded volume before any transform, `[depth][height][width]` order
/// (x fastest, matching the on-disk NIfTI layout).
#[derive(Debug, Clone)]
pub struct RawVolume {
    pub voxels: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

/// Reads one slice file as grayscale f32.
pub fn read_slice(path: &Path) -> DatasetResult<RawSlice> {
    let img = image::open(path).map_err(|e| DatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    let gray = img.to_luma32f();
    let (width, height) = gray.dimensions();
    Ok(RawSlice {
        pixels: gray.into_raw(),
        width: width as usize,
        height: height as usize,
    })
}

/// Reads one `.nii` / `.nii.gz` volume as f32 voxels.
pub fn read_volume(path: &Path) -> DatasetResult<RawVolume> {
    let nifti_err = |e| DatasetError::Nifti {
        path: path.to_path_buf(),
        source: e,
    };
    let object = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
    let volume = object.into_volume();
    let dims = volume.dim().to_vec();
    if dims.len() < 3 {
        return Err(DatasetError::Malformed {
            path: path.to_path_buf(),
            msg: format!("expected a 3D volume, found {} dims", dims.len()),
        });
    }
    if dims[3..].iter().any(|&d| d > 1) {
        return Err(DatasetError::Malformed {
            path: path.to_path_buf(),
            msg: format!("trailing dimensions are not singleton: {dims:?}"),
        });
    }
    let (width, height, depth) = (dims[0] as usize, dims[1] as usize, dims[2] as usize);
    if width == 0 || height == 0 || depth == 0 {
        return Err(DatasetError::Malformed {
            path: path.to_path_buf(),
            msg: format!("degenerate volume shape {dims:?}"),
        });
    }

    let mut voxels = vec![0.0f32; width * height * depth];
    let mut coords = vec![0u16; dims.len()];
    for z in 0..depth {
        coords[2] = z as u16;
        for y in 0..height {
            coords[1] = y as u16;
            for x in 0..width {
                coords[0] = x as u16;
                voxels[(z * height + y) * width + x] =
                    volume.get_f32(&coords).map_err(nifti_err)?;
            }
        }
    }
    Ok(RawVolume {
        voxels,
        width,
        height,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn put_i16(buf: &mut [u8], off: usize, v: i16) {
        buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_i32(buf: &mut [u8], off: usize, v: i32) {
        buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put_f32(buf: &mut [u8], off: usize, v: f32) {
        buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Minimal single-file NIfTI-1, float32, gzip-compressed.
    fn write_nifti_gz(path: &Path, (w, h, d): (usize, usize, usize), voxels: &[f32]) {
        assert_eq!(voxels.len(), w * h * d);
        let mut raw = vec![0u8; 352];
        put_i32(&mut raw, 0, 348);
        for (i, v) in [3i16, w as i16, h as i16, d as i16, 1, 1, 1, 1]
            .iter()
            .enumerate()
        {
            put_i16(&mut raw, 40 + 2 * i, *v);
        }
        put_i16(&mut raw, 70, 16); // DT_FLOAT32
        put_i16(&mut raw, 72, 32); // bitpix
        for i in 0..8 {
            put_f32(&mut raw, 76 + 4 * i, 1.0); // pixdim
        }
        put_f32(&mut raw, 108, 352.0); // vox_offset
        put_f32(&mut raw, 112, 1.0); // scl_slope
        raw[344..348].copy_from_slice(b"n+1\0");
        for v in voxels {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let file = std::fs::File::create(path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        enc.write_all(&raw).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn reads_slice_dimensions_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1_60.tiff");
        let img = image::GrayImage::from_fn(8, 6, |x, y| image::Luma([((x + y) % 256) as u8]));
        img.save(&path).unwrap();

        let raw = read_slice(&path).unwrap();
        assert_eq!((raw.width, raw.height), (8, 6));
        assert_eq!(raw.pixels.len(), 48);
    }

    #[test]
    fn slice_decode_failure_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_60.tiff");
        std::fs::write(&path, b"not a tiff").unwrap();
        let err = read_slice(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Image { .. }));
    }

    #[test]
    fn reads_volume_voxels_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1_70.nii.gz");
        let voxels: Vec<f32> = (0..24).map(|v| v as f32).collect();
        write_nifti_gz(&path, (2, 3, 4), &voxels);

        let raw = read_volume(&path).unwrap();
        assert_eq!((raw.width, raw.height, raw.depth), (2, 3, 4));
        assert_eq!(raw.voxels, voxels);
    }

    #[test]
    fn volume_decode_failure_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_70.nii.gz");
        std::fs::write(&path, b"not a nifti").unwrap();
        let err = read_volume(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Nifti { .. }));
    }
}
