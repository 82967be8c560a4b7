// Error types: fatal conditions that abort a run

use crate::memdomain::MatrixId;
use thiserror::Error;

/// Fatal engine and memory errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
  #[error("matrix dimensions mismatch: A is {m}x{k}, B is {k2}x{n}")]
  DimensionMismatch { m: usize, k: usize, k2: usize, n: usize },
  #[error("matrix {0} has no elements")]
  EmptyMatrix(MatrixId),
  #[error("{len} elements supplied for a {rows}x{cols} matrix")]
  RaggedMatrix { rows: usize, cols: usize, len: usize },
  #[error("memory address out of bounds: row {row} (of {rows}), offset {offset}")]
  AddressOutOfBounds { row: usize, offset: usize, rows: usize },
  #[error("{matrix}[{i}][{j}] out of bounds")]
  ElementOutOfBounds { matrix: MatrixId, i: usize, j: usize },
  #[error("malformed instruction token '{0}'")]
  MalformedInstruction(String),
}

/// Errors raised while reading a trace file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
  #[error("matrix dimensions not found in trace")]
  MissingDimensions,
  #[error("number of cores not found in trace")]
  MissingCoreCount,
  #[error("line {line}: {reason}")]
  Malformed { line: usize, reason: String },
}

/// Errors raised while generating a trace.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
  #[error("matrix dimensions must be > 0, got {m}x{k} * {k}x{n}")]
  EmptyDimensions { m: usize, k: usize, n: usize },
  #[error("core count must be > 0")]
  NoCores,
  #[error("core {0} does not fit the 6-bit core field")]
  CoreOutOfRange(usize),
  #[error("memory row {0} does not fit the 9-bit address field")]
  RowOutOfRange(usize),
  #[error(transparent)]
  Layout(#[from] SimError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("cannot read config file {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to parse TOML config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Top-level error returned by the command line front end.
#[derive(Error, Debug)]
pub enum PimError {
  #[error(transparent)]
  Sim(#[from] SimError),
  #[error(transparent)]
  Trace(#[from] TraceError),
  #[error(transparent)]
  Gen(#[from] GenError),
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Readline(#[from] rustyline::error::ReadlineError),
}
