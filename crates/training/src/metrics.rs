//! Per-epoch metric accumulation and the scalar log.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Collects per-batch scalars for one epoch; reset between epochs.
#[derive(Debug, Default)]
pub struct EpochAccumulator {
    values: Vec<f32>,
}

impl EpochAccumulator {
    pub fn push(&mut self, value: f32) {
        self.values.push(value);
    }

    /// Epoch mean; 0.0 when no batches ran.
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f32>() / self.values.len() as f32
        }
    }

    /// The final batch's value, which the checkpoint rule compares.
    pub fn last(&self) -> Option<f32> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }
}

/// Appends one JSON object per epoch to `metrics.jsonl` for later plotting.
#[derive(Debug)]
pub struct ScalarLog {
    path: PathBuf,
}

impl ScalarLog {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            path: out_dir.join("metrics.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &serde_json::Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{record}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_means_and_resets() {
        let mut acc = EpochAccumulator::default();
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.last(), None);

        acc.push(2.0);
        acc.push(4.0);
        assert_eq!(acc.len(), 2);
        assert!((acc.mean() - 3.0).abs() < 1e-6);
        assert_eq!(acc.last(), Some(4.0));

        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.last(), None);
    }

    #[test]
    fn scalar_log_appends_one_line_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScalarLog::new(dir.path());
        for epoch in 0..3 {
            let record = serde_json::json!({ "epoch": epoch, "train_mse": 1.5 });
            log.append(&record).unwrap();
        }
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed["epoch"], 2);
    }
}
