// Trace parser: instruction file text -> typed trace configuration
//
// Grammar, one item per line:
//   blank
//   '#' comment        may carry metadata, see `parse_comment`
//   HEX ['#' comment]  one instruction word

use super::generator::distribute_work;
use crate::coredomain::RowRange;
use crate::error::{PimError, TraceError};
use crate::global_decoder::instruction::MAX_ADDR;
use crate::global_decoder::parse_token;
use crate::memdomain::MatrixDims;
use crate::simulator::RowAssignments;
use log::{info, warn};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEntry {
  Instruction { line: usize, raw: u32 },
  /// `Core C ... Processing row R`: move core C to row R before the next instruction.
  RowHint { line: usize, core_id: usize, row: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFile {
  pub dims: MatrixDims,
  pub num_cores: usize,
  pub row_assignments: RowAssignments,
  pub entries: Vec<TraceEntry>,
}

impl TraceFile {
  pub fn instructions(&self) -> impl Iterator<Item = u32> + '_ {
    self.entries.iter().filter_map(|entry| match entry {
      TraceEntry::Instruction { raw, .. } => Some(*raw),
      TraceEntry::RowHint { .. } => None,
    })
  }

  pub fn instruction_count(&self) -> usize {
    self.instructions().count()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metadata {
  Dimensions { m: usize, k: usize, k2: usize, n: usize },
  CoreCount(usize),
  Assignment { core_id: usize, range: RowRange },
  RowHint { core_id: usize, row: usize },
}

/// Words of a comment with surrounding punctuation removed, so that
/// `(Rows 0 to 3)` yields `Rows`, `0`, `to`, `3`.
fn words(comment: &str) -> Vec<&str> {
  comment
    .split_whitespace()
    .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
    .filter(|w| !w.is_empty())
    .collect()
}

fn number(word: Option<&&str>) -> Option<usize> {
  word.and_then(|w| w.parse().ok())
}

/// Value following the first occurrence of `key`.
fn number_after(words: &[&str], key: &str) -> Option<usize> {
  let pos = words.iter().position(|w| *w == key)?;
  number(words.get(pos + 1))
}

/// `MxK * KxN`
fn parse_dimensions(text: &str, line: usize) -> Result<Metadata, TraceError> {
  let malformed = || TraceError::Malformed { line, reason: format!("bad matrix dimensions '{}'", text.trim()) };
  let shape = |side: &str| -> Option<(usize, usize)> {
    let (rows, cols) = side.trim().split_once('x')?;
    Some((rows.trim().parse().ok()?, cols.trim().parse().ok()?))
  };
  let (lhs, rhs) = text.split_once('*').ok_or_else(malformed)?;
  let (m, k) = shape(lhs).ok_or_else(malformed)?;
  let (k2, n) = shape(rhs).ok_or_else(malformed)?;
  Ok(Metadata::Dimensions { m, k, k2, n })
}

fn parse_comment(comment: &str, line: usize) -> Result<Option<Metadata>, TraceError> {
  if let Some((_, text)) = comment.split_once("Matrix dimensions:") {
    return parse_dimensions(text, line).map(Some);
  }

  let words = words(comment);
  let core_id = number_after(&words, "Core");

  if let Some(pos) = words.windows(3).position(|w| w[0] == "Using" && (w[2] == "cores" || w[2] == "core")) {
    if let Some(n) = number(words.get(pos + 1)) {
      return Ok(Some(Metadata::CoreCount(n)));
    }
  }

  if let (Some(core_id), Some(pos)) = (core_id, words.iter().position(|w| *w == "Rows")) {
    let start = number(words.get(pos + 1));
    let end = words.get(pos + 2).filter(|w| **w == "to").and(number(words.get(pos + 3)));
    match (start, end) {
      (Some(start), Some(end)) => return Ok(Some(Metadata::Assignment { core_id, range: RowRange::new(start, end) })),
      _ => warn!("line {}: ignoring row range in '{}'", line, comment.trim()),
    }
  }

  if let (Some(core_id), Some(pos)) = (core_id, words.windows(2).position(|w| w[0] == "Processing" && w[1] == "row")) {
    if let Some(row) = number(words.get(pos + 2)) {
      return Ok(Some(Metadata::RowHint { core_id, row }));
    }
  }

  Ok(None)
}

/// Reject shapes whose A, B and C regions do not fit in addressable memory.
fn check_layout(dims: MatrixDims, line: usize) -> Result<(), TraceError> {
  let capacity = MAX_ADDR + 1;
  match dims.memory_rows() {
    Some(rows) if rows <= capacity => Ok(()),
    Some(rows) => Err(TraceError::Malformed {
      line,
      reason: format!("{}x{} * {}x{} needs {} memory rows, only {} are addressable", dims.m, dims.k, dims.k, dims.n, rows, capacity),
    }),
    None => Err(TraceError::Malformed {
      line,
      reason: format!("{}x{} * {}x{} overflows the address space", dims.m, dims.k, dims.k, dims.n),
    }),
  }
}

pub fn parse_trace(text: &str) -> Result<TraceFile, TraceError> {
  let mut dims = None;
  let mut num_cores = None;
  let mut row_assignments = RowAssignments::new();
  let mut entries = Vec::new();

  for (idx, raw_line) in text.lines().enumerate() {
    let line = idx + 1;
    let trimmed = raw_line.trim();
    if trimmed.is_empty() {
      continue;
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
      match parse_comment(comment, line)? {
        Some(Metadata::Dimensions { m, k, k2, n }) => {
          if k != k2 {
            warn!("line {}: matrix dimensions mismatch: {} != {}", line, k, k2);
          }
          let parsed = MatrixDims::new(m, k, n);
          check_layout(parsed, line)?;
          dims = Some(parsed);
        },
        Some(Metadata::CoreCount(n)) => num_cores = Some(n),
        Some(Metadata::Assignment { core_id, range }) => {
          row_assignments.insert(core_id, range);
        },
        Some(Metadata::RowHint { core_id, row }) => entries.push(TraceEntry::RowHint { line, core_id, row }),
        None => {},
      }
      continue;
    }

    let (token, comment) = trimmed.split_once('#').unwrap_or((trimmed, ""));
    let raw = parse_token(token.trim()).map_err(|e| TraceError::Malformed { line, reason: e.to_string() })?;
    // a hint trailing an instruction takes effect before that instruction
    if let Ok(Some(Metadata::RowHint { core_id, row })) = parse_comment(comment, line) {
      entries.push(TraceEntry::RowHint { line, core_id, row });
    }
    entries.push(TraceEntry::Instruction { line, raw });
  }

  let dims = dims.ok_or(TraceError::MissingDimensions)?;
  let num_cores = num_cores.ok_or(TraceError::MissingCoreCount)?;

  if row_assignments.is_empty() {
    info!("No row assignments in trace, distributing {} rows across {} cores", dims.m, num_cores);
    row_assignments = distribute_work(dims.m, num_cores);
  }

  Ok(TraceFile { dims, num_cores, row_assignments, entries })
}

pub fn load_trace(path: &Path) -> Result<TraceFile, PimError> {
  let text = fs::read_to_string(path)?;
  let trace = parse_trace(&text)?;
  info!(
    "Parsed {}: {}x{} * {}x{}, {} cores, {} instructions",
    path.display(),
    trace.dims.m,
    trace.dims.k,
    trace.dims.k,
    trace.dims.n,
    trace.num_cores,
    trace.instruction_count()
  );
  Ok(trace)
}

#[cfg(test)]
mod tests {
  use super::*;

  const HEADER: &str = "# PIM Instructions for Matrix Multiplication\n# Matrix dimensions: 4x3 * 3x5\n# Using 2 cores\n";

  #[test]
  fn test_header_metadata() {
    let trace = parse_trace(HEADER).unwrap();
    assert_eq!(trace.dims, MatrixDims::new(4, 3, 5));
    assert_eq!(trace.num_cores, 2);
    assert!(trace.entries.is_empty());
  }

  #[test]
  fn test_fallback_assignments() {
    let trace = parse_trace(HEADER).unwrap();
    assert_eq!(trace.row_assignments[&0], RowRange::new(0, 1));
    assert_eq!(trace.row_assignments[&1], RowRange::new(2, 3));
  }

  #[test]
  fn test_explicit_assignments_and_instructions() {
    let text = format!(
      "{}\n# Instructions for Core 1 (Rows 0 to 3)\n020c01 # Binary: 000000100000110000000001\n  0x60800\n",
      HEADER
    );
    let trace = parse_trace(&text).unwrap();
    assert_eq!(trace.row_assignments.len(), 1);
    assert_eq!(trace.row_assignments[&1], RowRange::new(0, 3));
    assert_eq!(trace.instructions().collect::<Vec<_>>(), vec![0x020c01, 0x60800]);
    assert_eq!(trace.entries[0], TraceEntry::Instruction { line: 6, raw: 0x020c01 });
  }

  #[test]
  fn test_row_hint_requires_core() {
    let text = format!("{}# Processing row 2\n# Core 1: Processing row 3\n", HEADER);
    let trace = parse_trace(&text).unwrap();
    assert_eq!(trace.entries, vec![TraceEntry::RowHint { line: 5, core_id: 1, row: 3 }]);
  }

  #[test]
  fn test_missing_metadata() {
    assert_eq!(parse_trace("# Using 2 cores\n"), Err(TraceError::MissingDimensions));
    assert_eq!(parse_trace("# Matrix dimensions: 2x2 * 2x2\n"), Err(TraceError::MissingCoreCount));
  }

  #[test]
  fn test_malformed_lines() {
    let bad_hex = format!("{}xyz\n", HEADER);
    assert!(matches!(parse_trace(&bad_hex), Err(TraceError::Malformed { line: 4, .. })));
    assert!(matches!(
      parse_trace("# Matrix dimensions: 2 by 2\n"),
      Err(TraceError::Malformed { line: 1, .. })
    ));
  }

  #[test]
  fn test_unreadable_row_range_is_skipped() {
    let text = format!("{}# Core 0 Rows 1 through 2\n# Core 1 (Rows 0 to 3)\n", HEADER);
    let trace = parse_trace(&text).unwrap();
    assert_eq!(trace.row_assignments.len(), 1);
    assert_eq!(trace.row_assignments[&1], RowRange::new(0, 3));
  }

  #[test]
  fn test_inline_row_hint_precedes_instruction() {
    let text = format!("{}040400\n040401 # Core 0: Processing row 2\n", HEADER);
    let trace = parse_trace(&text).unwrap();
    assert_eq!(
      trace.entries,
      vec![
        TraceEntry::Instruction { line: 4, raw: 0x040400 },
        TraceEntry::RowHint { line: 5, core_id: 0, row: 2 },
        TraceEntry::Instruction { line: 5, raw: 0x040401 },
      ]
    );
  }

  #[test]
  fn test_unaddressable_dimensions_rejected() {
    let text = "# Matrix dimensions: 4294967296x4294967296 * 4294967296x1\n# Using 1 cores\n";
    assert!(matches!(parse_trace(text), Err(TraceError::Malformed { line: 1, .. })));
    // 513 rows of A alone
    let text = "# Matrix dimensions: 513x512 * 512x1\n# Using 1 cores\n";
    assert!(matches!(parse_trace(text), Err(TraceError::Malformed { line: 1, .. })));
    assert!(parse_trace("# Matrix dimensions: 16x16 * 16x16\n# Using 1 cores\n").is_ok());
  }

  #[test]
  fn test_inner_dimension_mismatch_uses_a_cols() {
    let trace = parse_trace("# Matrix dimensions: 2x3 * 4x5\n# Using 1 cores\n").unwrap();
    assert_eq!(trace.dims, MatrixDims::new(2, 3, 5));
  }
}
