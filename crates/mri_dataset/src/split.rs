//! Random train/validation/test splitting and split manifest persistence.

use crate::types::{DatasetError, DatasetResult, Subject};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

pub const TRAIN_MANIFEST: &str = "train2d.txt";
pub const VALIDATION_MANIFEST: &str = "validation2d.txt";
pub const TEST_MANIFEST: &str = "test2d.txt";

/// Disjoint index sets into the discovered subject list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Seeded random partition of `count` subjects by `ratios`
/// (train, validation, test).
///
/// Each share is floored; when the ratios sum to 1.0 the remainder is handed
/// out one subject at a time starting with the train split, so the three sizes
/// always sum to `count`. Ratios summing below 1.0 drop the tail. Ratios
/// summing above 1.0 are rejected.
pub fn split_subjects(count: usize, ratios: [f32; 3], seed: u64) -> DatasetResult<SplitIndices> {
    let ratio_sum: f32 = ratios.iter().sum();
    if ratio_sum > 1.0 + 1e-6 {
        return Err(DatasetError::Other(format!(
            "split ratios sum to {ratio_sum}, expected at most 1.0"
        )));
    }
    let mut order: Vec<usize> = (0..count).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut sizes = [0usize; 3];
    for (size, ratio) in sizes.iter_mut().zip(ratios.iter()) {
        *size = (count as f64 * *ratio as f64).floor() as usize;
    }
    if ratio_sum >= 1.0 - 1e-6 {
        let mut remainder = count - sizes.iter().sum::<usize>();
        let mut i = 0usize;
        while remainder > 0 {
            sizes[i % 3] += 1;
            remainder -= 1;
            i += 1;
        }
    }

    let validation_start = sizes[0];
    let test_start = sizes[0] + sizes[1];
    let test_end = test_start + sizes[2];
    Ok(SplitIndices {
        train: order[..validation_start].to_vec(),
        validation: order[validation_start..test_start].to_vec(),
        test: order[test_start..test_end].to_vec(),
    })
}

/// Writes the three split manifests under `<dir>/split/`, one subject stem per
/// line, replacing whatever a previous run left there.
pub fn write_manifests(dir: &Path, subjects: &[Subject], splits: &SplitIndices) -> DatasetResult<()> {
    let split_dir = dir.join("split");
    std::fs::create_dir_all(&split_dir).map_err(|e| DatasetError::Io {
        path: split_dir.clone(),
        source: e,
    })?;
    write_manifest(&split_dir.join(TRAIN_MANIFEST), subjects, &splits.train)?;
    write_manifest(
        &split_dir.join(VALIDATION_MANIFEST),
        subjects,
        &splits.validation,
    )?;
    write_manifest(&split_dir.join(TEST_MANIFEST), subjects, &splits.test)?;
    Ok(())
}

fn write_manifest(path: &Path, subjects: &[Subject], indices: &[usize]) -> DatasetResult<()> {
    let mut out = String::new();
    for &i in indices {
        out.push_str(&subjects[i].stem);
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads one manifest back as a stem list (audit helper).
pub fn read_manifest(path: &Path) -> DatasetResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(content.lines().map(String::from).collect())
}
