// Report: result validation against a reference product and the JSON run summary

use super::RunResult;
use crate::error::{PimError, SimError};
use crate::memdomain::{Matrix, MatrixDims};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

/// Matrices with at most this many rows are logged in full.
const FULL_DUMP_ROWS: usize = 8;
const EXCERPT_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
  pub i: usize,
  pub j: usize,
  pub expected: i32,
  pub actual: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
  pub passed: bool,
  pub total: usize,
  pub mismatches: usize,
  pub max_abs_diff: u32,
  pub first_mismatch: Option<Mismatch>,
}

impl ValidationReport {
  pub fn error_percent(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.mismatches as f64 * 100.0 / self.total as f64
    }
  }
}

/// Element-wise comparison. A shape difference counts every expected element as a mismatch.
pub fn compare(expected: &Matrix, actual: &Matrix) -> ValidationReport {
  let total = expected.len();
  if expected.rows() != actual.rows() || expected.cols() != actual.cols() {
    warn!(
      "Shape mismatch: result is {}x{}, expected {}x{}",
      actual.rows(),
      actual.cols(),
      expected.rows(),
      expected.cols()
    );
    return ValidationReport { passed: false, total, mismatches: total, max_abs_diff: 0, first_mismatch: None };
  }

  let mut mismatches = 0;
  let mut max_abs_diff = 0;
  let mut first_mismatch = None;
  for i in 0..expected.rows() {
    for (j, (&e, &a)) in expected.row(i).unwrap_or_default().iter().zip(actual.row(i).unwrap_or_default()).enumerate() {
      if e != a {
        mismatches += 1;
        max_abs_diff = max_abs_diff.max(e.abs_diff(a));
        if first_mismatch.is_none() {
          first_mismatch = Some(Mismatch { i, j, expected: e, actual: a });
        }
      }
    }
  }

  ValidationReport { passed: mismatches == 0, total, mismatches, max_abs_diff, first_mismatch }
}

/// Reference product of `a` and `b`, compared with `actual`.
pub fn validate(a: &Matrix, b: &Matrix, actual: &Matrix) -> Result<(Matrix, ValidationReport), SimError> {
  let expected = a.matmul(b).ok_or(SimError::DimensionMismatch {
    m: a.rows(),
    k: a.cols(),
    k2: b.rows(),
    n: b.cols(),
  })?;
  let report = compare(&expected, actual);
  Ok((expected, report))
}

fn format_rows(m: &Matrix, rows: Range<usize>) -> String {
  rows
    .filter(|&i| i < m.rows())
    .map(|i| {
      let cells: Vec<String> = m.row(i).unwrap_or_default().iter().map(|v| format!("{:>6}", v)).collect();
      format!("[{}]", cells.join(" "))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn log_excerpt(title: &str, expected: &Matrix, actual: &Matrix, diff: &Matrix, rows: Range<usize>) {
  warn!("{}", title);
  warn!("Expected:\n{}", format_rows(expected, rows.clone()));
  warn!("Result:\n{}", format_rows(actual, rows.clone()));
  warn!("Differences:\n{}", format_rows(diff, rows));
}

/// Log the outcome. Failures show the full matrices when small, otherwise the
/// first, middle and last rows.
pub fn log_report(expected: &Matrix, actual: &Matrix, report: &ValidationReport) {
  if report.passed {
    info!("Result validation PASSED!");
    return;
  }

  warn!(
    "Result validation FAILED: {}/{} elements differ ({:.2}%)",
    report.mismatches,
    report.total,
    report.error_percent()
  );
  warn!("Maximum difference: {}", report.max_abs_diff);
  if let Some(m) = report.first_mismatch {
    warn!("First mismatch at C[{}][{}]: expected {}, got {}", m.i, m.j, m.expected, m.actual);
  }

  if expected.rows() != actual.rows() || expected.cols() != actual.cols() {
    return;
  }
  let diff = Matrix::from_fn(actual.rows(), actual.cols(), |i, j| {
    let a = actual.get(i, j).unwrap_or_default();
    let e = expected.get(i, j).unwrap_or_default();
    a.wrapping_sub(e)
  });

  let rows = actual.rows();
  if rows <= FULL_DUMP_ROWS {
    log_excerpt("Full comparison:", expected, actual, &diff, 0..rows);
    return;
  }

  let mid = rows / 2;
  log_excerpt(&format!("First rows (0-{}):", EXCERPT_ROWS - 1), expected, actual, &diff, 0..EXCERPT_ROWS);
  log_excerpt(&format!("Middle rows ({}-{}):", mid, mid + EXCERPT_ROWS - 1), expected, actual, &diff, mid..mid + EXCERPT_ROWS);
  log_excerpt(&format!("Last rows ({}-{}):", rows - EXCERPT_ROWS, rows - 1), expected, actual, &diff, rows - EXCERPT_ROWS..rows);
}

/// Summary of one simulation run as written to `--report`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
  pub dims: MatrixDims,
  pub num_cores: usize,
  pub instructions: usize,
  pub run: &'a RunResult,
  pub validation: Option<&'a ValidationReport>,
}

pub fn write_report(path: &Path, report: &RunReport<'_>) -> Result<(), PimError> {
  let mut writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer_pretty(&mut writer, report)?;
  writeln!(writer)?;
  writer.flush()?;
  info!("Report written to {}", path.display());
  Ok(())
}
