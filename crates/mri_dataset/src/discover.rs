//! Dataset discovery and age-label derivation.
//!
//! Subjects are image files named `<id>_<age><postfix>` (for example
//! `sub-0421_63.4.tiff`). The age is the token after the last underscore, and
//! every label is normalized by the dataset mean age so the network regresses
//! values near 1.0.

use crate::types::{DatasetError, DatasetResult, Subject};
use std::path::Path;

/// Maps ages to and from the normalized space used for regression targets.
///
/// Normalization divides by the dataset mean age; `denormalize` is its exact
/// inverse, so `denormalize(normalize(age)) == age` for any finite age.
#[derive(Debug, Clone, Copy)]
pub struct AgeScale {
    mean_age: f32,
}

impl AgeScale {
    pub fn new(mean_age: f32) -> Self {
        Self { mean_age }
    }

    pub fn mean_age(&self) -> f32 {
        self.mean_age
    }

    pub fn normalize(&self, age: f32) -> f32 {
        age / self.mean_age
    }

    pub fn denormalize(&self, value: f32) -> f32 {
        value * self.mean_age
    }
}

/// Everything discovery produces: the ordered subject list and the label scale.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub subjects: Vec<Subject>,
    pub scale: AgeScale,
}

impl Discovery {
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Scans `root` for files ending in `postfix`, derives an age per file, and
/// computes the dataset mean age.
///
/// Files are sorted by name before the optional `max_subjects` cap is applied,
/// so the same directory always yields the same subject list. Fails fast when
/// nothing matches or any file name does not carry a parseable age.
pub fn discover(
    root: &Path,
    postfix: &str,
    max_subjects: Option<usize>,
) -> DatasetResult<Discovery> {
    let entries = std::fs::read_dir(root).map_err(|e| DatasetError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut named = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        if name.len() > postfix.len() && name.ends_with(postfix) {
            named.push((name, path));
        }
    }
    named.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some(cap) = max_subjects {
        named.truncate(cap);
    }
    if named.is_empty() {
        return Err(DatasetError::Discovery {
            path: root.to_path_buf(),
            postfix: postfix.to_string(),
        });
    }

    let mut subjects = Vec::with_capacity(named.len());
    let mut age_sum = 0.0f64;
    for (name, path) in named {
        let stem = name[..name.len() - postfix.len()].to_string();
        let age = parse_age(&stem).ok_or_else(|| DatasetError::Label {
            path: path.clone(),
            msg: format!("expected '<id>_<age>' in '{stem}'"),
        })?;
        age_sum += age as f64;
        subjects.push(Subject { path, stem, age });
    }
    let mean_age = (age_sum / subjects.len() as f64) as f32;

    Ok(Discovery {
        subjects,
        scale: AgeScale::new(mean_age),
    })
}

/// Age is the token after the last `_` in the stem; must parse as a finite f32.
fn parse_age(stem: &str) -> Option<f32> {
    let token = stem.rsplit('_').next()?;
    if token == stem {
        // No underscore at all.
        return None;
    }
    let age: f32 = token.parse().ok()?;
    age.is_finite().then_some(age)
}
