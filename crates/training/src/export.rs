//! The per-sample prediction table and its CSV serialization.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("csv flush failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Header of the exported CSV; column order matches `PredictionRow` fields.
pub const CSV_HEADER: [&str; 4] = ["Age", "Prediction", "ABSError", "ABSMEANError"];

/// One test-set row.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub age: f32,
    pub prediction: f32,
    pub abs_error: f32,
    pub abs_mean_error: f32,
}

/// Grows by one row per test sample; immutable once written out.
#[derive(Debug, Default)]
pub struct PredictionTable {
    rows: Vec<PredictionRow>,
}

impl PredictionTable {
    /// Appends a row, deriving both error columns. `abs_mean_error` is the
    /// naive baseline of always predicting the dataset mean age.
    pub fn push(&mut self, age: f32, prediction: f32, mean_age: f32) {
        self.rows.push(PredictionRow {
            age,
            prediction,
            abs_error: (age - prediction).abs(),
            abs_mean_error: (age - mean_age).abs(),
        });
    }

    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean absolute error over all rows.
    pub fn mae(&self) -> f32 {
        mean(self.rows.iter().map(|r| r.abs_error))
    }

    /// Mean squared error over all rows.
    pub fn mse(&self) -> f32 {
        mean(self.rows.iter().map(|r| {
            let d = r.age - r.prediction;
            d * d
        }))
    }

    /// Mean absolute error of the predict-the-mean baseline.
    pub fn baseline_mae(&self) -> f32 {
        mean(self.rows.iter().map(|r| r.abs_mean_error))
    }

    /// Writes the table with its fixed header; the header is emitted even for
    /// an empty test set.
    pub fn write_csv(&self, path: &Path) -> Result<(), ExportError> {
        let csv_err = |e| ExportError::Csv {
            path: path.to_path_buf(),
            source: e,
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(csv_err)?;
        writer.write_record(CSV_HEADER).map_err(csv_err)?;
        for row in &self.rows {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_columns_and_summary_metrics() {
        // Ages 60/70/80, predictions 62/68/85, dataset mean 70.
        let mut table = PredictionTable::default();
        table.push(60.0, 62.0, 70.0);
        table.push(70.0, 68.0, 70.0);
        table.push(80.0, 85.0, 70.0);

        let abs: Vec<f32> = table.rows().iter().map(|r| r.abs_error).collect();
        let abs_mean: Vec<f32> = table.rows().iter().map(|r| r.abs_mean_error).collect();
        assert_eq!(abs, vec![2.0, 2.0, 5.0]);
        assert_eq!(abs_mean, vec![10.0, 0.0, 10.0]);
        assert!((table.mae() - 3.0).abs() < 1e-6);
        assert!((table.mse() - (4.0 + 4.0 + 25.0) / 3.0).abs() < 1e-5);
        assert!((table.baseline_mae() - 20.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn csv_has_exact_header_and_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let mut table = PredictionTable::default();
        table.push(60.0, 62.0, 70.0);
        table.push(70.0, 68.0, 70.0);
        table.push(80.0, 85.0, 70.0);
        table.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "Age,Prediction,ABSError,ABSMEANError");
        assert_eq!(lines.len(), 1 + table.len());
        assert!(lines[1].starts_with("60.0,62.0,"));
    }

    #[test]
    fn empty_table_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        PredictionTable::default().write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(content.lines().next().unwrap(), "Age,Prediction,ABSError,ABSMEANError");
    }
}
