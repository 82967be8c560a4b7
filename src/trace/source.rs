// Source front end: matrix dimensions declared in a C/C++ matmul kernel
//
// Recognised declarations, later ones win:
//   #define M 64                  (also ROWS_A / ROWS, COLS_B / COLS, COLS_A / ROWS_B)
//   const int K = 32;             (also rowsA / rows, colsB / cols, colsA / rowsB)
// When a dimension is still unknown, `for (int i = 0; i < 8; ...)` loop
// bounds over i, j and k fill it in.

use crate::error::PimError;
use crate::memdomain::MatrixDims;
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Used for any dimension neither the source nor the command line sets.
pub const DEFAULT_DIMENSION: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceDims {
  pub m: Option<usize>,
  pub k: Option<usize>,
  pub n: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dim {
  M,
  K,
  N,
}

fn macro_dim(name: &str) -> Option<Dim> {
  match name {
    "M" | "ROWS_A" | "ROWS" => Some(Dim::M),
    "K" | "COLS_A" | "ROWS_B" => Some(Dim::K),
    "N" | "COLS_B" | "COLS" => Some(Dim::N),
    _ => None,
  }
}

fn const_dim(name: &str) -> Option<Dim> {
  match name {
    "M" | "rowsA" | "rows" => Some(Dim::M),
    "K" | "colsA" | "rowsB" => Some(Dim::K),
    "N" | "colsB" | "cols" => Some(Dim::N),
    _ => None,
  }
}

fn loop_dim(var: &str) -> Option<Dim> {
  match var {
    "i" => Some(Dim::M),
    "j" => Some(Dim::N),
    "k" => Some(Dim::K),
    _ => None,
  }
}

fn is_ident(word: &str) -> bool {
  !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `#define NAME VALUE`
fn define(line: &str) -> Option<(Dim, usize)> {
  let rest = line.trim_start().strip_prefix('#')?.trim_start().strip_prefix("define")?;
  let mut words = rest.split_whitespace();
  let dim = macro_dim(words.next()?)?;
  Some((dim, words.next()?.parse().ok()?))
}

/// `const TYPE NAME = VALUE`, anywhere on the line.
fn constant(line: &str) -> Option<(Dim, usize)> {
  let words: Vec<&str> = line.split(|c: char| c.is_whitespace() || c == '=' || c == ';').filter(|w| !w.is_empty()).collect();
  let pos = words.iter().position(|w| *w == "const")?;
  let (ty, name, value) = (words.get(pos + 1)?, words.get(pos + 2)?, words.get(pos + 3)?);
  if !is_ident(ty) {
    return None;
  }
  Some((const_dim(name)?, value.parse().ok()?))
}

/// `(VAR = 0; VAR < BOUND; ...)` header of one `for` loop.
fn loop_bound(header: &str) -> Option<(String, String)> {
  let mut clauses = header.split(';');
  let init = clauses.next()?;
  let cond = clauses.next()?;
  let (lhs, start) = init.split_once('=')?;
  let var = lhs.split_whitespace().last()?;
  if start.trim() != "0" {
    return None;
  }
  let (cvar, bound) = cond.split_once('<')?;
  if cvar.trim() != var || bound.starts_with('=') {
    return None;
  }
  Some((var.to_string(), bound.trim().to_string()))
}

fn loop_bounds(code: &str) -> Vec<(String, String)> {
  code
    .match_indices("for")
    .filter(|(idx, _)| {
      let before = code[..*idx].chars().next_back();
      !before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    })
    .filter_map(|(idx, kw)| {
      let rest = code[idx + kw.len()..].trim_start().strip_prefix('(')?;
      let header = &rest[..rest.find(')')?];
      loop_bound(header)
    })
    .collect()
}

impl SourceDims {
  fn get(&self, dim: Dim) -> Option<usize> {
    match dim {
      Dim::M => self.m,
      Dim::K => self.k,
      Dim::N => self.n,
    }
  }

  fn set(&mut self, dim: Dim, value: usize) {
    match dim {
      Dim::M => self.m = Some(value),
      Dim::K => self.k = Some(value),
      Dim::N => self.n = Some(value),
    }
  }

  pub fn is_complete(&self) -> bool {
    self.m.is_some() && self.k.is_some() && self.n.is_some()
  }

  /// Every dimension set in `overrides` replaces this one; anything still
  /// unknown falls back to `DEFAULT_DIMENSION`.
  pub fn resolve(&self, overrides: SourceDims) -> MatrixDims {
    let pick = |dim: Dim, name: &str| {
      overrides.get(dim).or(self.get(dim)).unwrap_or_else(|| {
        warn!("No value found for {}, using default {}", name, DEFAULT_DIMENSION);
        DEFAULT_DIMENSION
      })
    };
    MatrixDims::new(pick(Dim::M, "M"), pick(Dim::K, "K"), pick(Dim::N, "N"))
  }
}

/// Scan source text for the M, K and N of a matrix multiplication.
pub fn scan_dimensions(code: &str) -> SourceDims {
  let mut dims = SourceDims::default();
  for line in code.lines() {
    if let Some((dim, value)) = define(line).or_else(|| constant(line)) {
      dims.set(dim, value);
    }
  }
  if dims.is_complete() {
    return dims;
  }

  let loops = loop_bounds(code);
  if loops.len() < 3 {
    return dims;
  }
  let known = dims;
  for (var, bound) in loops {
    let Some(dim) = loop_dim(&var) else { continue };
    let value = bound.parse().ok().or_else(|| macro_dim(&bound).or_else(|| const_dim(&bound)).and_then(|d| known.get(d)));
    if let Some(value) = value {
      dims.set(dim, value);
    }
  }
  dims
}

pub fn load_source(path: &Path) -> Result<SourceDims, PimError> {
  let code = fs::read_to_string(path)?;
  let dims = scan_dimensions(&code);
  info!(
    "Parsed {}: M={:?} K={:?} N={:?}",
    path.display(),
    dims.m,
    dims.k,
    dims.n
  );
  Ok(dims)
}

#[cfg(test)]
mod tests {
  use super::*;

  const KERNEL: &str = r#"
#include <stdio.h>
#define M 4
#define N 5
const int K = 3;

void matmul(int A[M][K], int B[K][N], int C[M][N]) {
  for (int i = 0; i < M; i++) {
    for (int j = 0; j < N; j++) {
      for (int k = 0; k < K; k++) {
        C[i][j] += A[i][k] * B[k][j];
      }
    }
  }
}
"#;

  #[test]
  fn test_define_and_const() {
    assert_eq!(scan_dimensions(KERNEL), SourceDims { m: Some(4), k: Some(3), n: Some(5) });
  }

  #[test]
  fn test_aliases_and_later_wins() {
    let code = "#define ROWS_A 7\n#define COLS_B 2\nstatic const size_t colsA = 9;\n#define M 8\n";
    assert_eq!(scan_dimensions(code), SourceDims { m: Some(8), k: Some(9), n: Some(2) });
  }

  #[test]
  fn test_loop_bounds_fill_gaps() {
    let code = "#define M 6\nfor (int i = 0; i < M; ++i)\n for (int j = 0; j < 4; ++j)\n  for (int k = 0; k < 10; ++k) {}\n";
    assert_eq!(scan_dimensions(code), SourceDims { m: Some(6), k: Some(10), n: Some(4) });
  }

  #[test]
  fn test_unrelated_lines_ignored() {
    let code = "#define MAX 10\nconst char *name = \"x\";\nint format = 0;\n";
    assert_eq!(scan_dimensions(code), SourceDims::default());
  }

  #[test]
  fn test_resolve_overrides_and_defaults() {
    let found = SourceDims { m: Some(4), k: Some(3), n: None };
    let overrides = SourceDims { k: Some(8), ..SourceDims::default() };
    assert_eq!(found.resolve(overrides), MatrixDims::new(4, 8, DEFAULT_DIMENSION));
  }

  #[test]
  fn test_load_source_missing_file() {
    assert!(load_source(Path::new("/nonexistent/kernel.c")).is_err());
  }
}
