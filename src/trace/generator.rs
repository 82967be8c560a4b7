// Trace generator: emits the per-core PIM program for C = A·B

use crate::coredomain::RowRange;
use crate::error::GenError;
use crate::global_decoder::instruction::{MAX_ADDR, MAX_CORE_ID, MICRO_OP_CLEAR, MICRO_OP_MAC};
use crate::global_decoder::{format_word, Instruction};
use crate::memdomain::{Address, MatrixDims, MatrixId, MemoryLayout};
use crate::simulator::RowAssignments;
use log::{info, warn};

/// Function selector PROG hands to every core.
pub const MATMUL_FUNCTION: u16 = 1;

/// Split M output rows evenly (ceiling division) across at most M cores.
pub fn distribute_work(m: usize, num_cores: usize) -> RowAssignments {
  let mut assignments = RowAssignments::new();
  if m == 0 || num_cores == 0 {
    return assignments;
  }
  let cores = if num_cores > m {
    warn!("More cores ({}) than matrix rows ({}). Using only {} cores.", num_cores, m, m);
    m
  } else {
    num_cores
  };
  let rows_per_core = m.div_ceil(cores);
  for core in 0..cores {
    let start = core * rows_per_core;
    let end = ((core + 1) * rows_per_core - 1).min(m - 1);
    if start <= end {
      assignments.insert(core, RowRange::new(start, end));
    }
  }
  assignments
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
  Blank,
  Comment(String),
  Instruction(Instruction),
}

impl TraceLine {
  fn comment(text: impl Into<String>) -> Self {
    TraceLine::Comment(text.into())
  }

  pub fn render(&self) -> String {
    match self {
      TraceLine::Blank => String::new(),
      TraceLine::Comment(text) => format!("# {}", text),
      TraceLine::Instruction(inst) => {
        let raw = inst.encode();
        format!("{} # Binary: {:024b}", format_word(raw), raw)
      },
    }
  }
}

pub struct TraceGenerator {
  layout: MemoryLayout,
  assignments: RowAssignments,
}

impl TraceGenerator {
  pub fn new(dims: MatrixDims, num_cores: usize) -> Result<Self, GenError> {
    if dims.m == 0 || dims.k == 0 || dims.n == 0 {
      return Err(GenError::EmptyDimensions { m: dims.m, k: dims.k, n: dims.n });
    }
    if num_cores == 0 {
      return Err(GenError::NoCores);
    }
    let layout = MemoryLayout::new(dims)?;
    let assignments = distribute_work(dims.m, num_cores);
    if let Some((&core, _)) = assignments.range(MAX_CORE_ID + 1..).next() {
      return Err(GenError::CoreOutOfRange(core));
    }
    if layout.total_rows() > MAX_ADDR + 1 {
      return Err(GenError::RowOutOfRange(layout.total_rows() - 1));
    }

    info!("Memory layout:");
    for matrix in [MatrixId::A, MatrixId::B, MatrixId::C] {
      let region = layout.region(matrix);
      info!(
        "  Matrix {}: Base address = {}, size = {} elements ({} rows)",
        matrix, region.base, region.elements, region.rows
      );
    }
    for (core, range) in &assignments {
      info!("  Core {}: Rows {} to {} ({} rows)", core, range.start, range.end, range.len());
    }

    Ok(Self { layout, assignments })
  }

  pub fn dims(&self) -> MatrixDims {
    self.layout.dims()
  }

  pub fn assignments(&self) -> &RowAssignments {
    &self.assignments
  }

  /// Address phase then offset phase of a load.
  fn load(out: &mut Vec<TraceLine>, core: usize, addr: Address) {
    out.push(TraceLine::Instruction(Instruction::load(core, addr.row as u16)));
    out.push(TraceLine::Instruction(Instruction::exe(core, addr.offset as u16)));
  }

  fn store(out: &mut Vec<TraceLine>, core: usize, addr: Address) {
    out.push(TraceLine::Instruction(Instruction::store(core, addr.row as u16)));
    out.push(TraceLine::Instruction(Instruction::exe(core, addr.offset as u16)));
  }

  pub fn core_sequence(&self, core: usize, range: RowRange) -> Result<Vec<TraceLine>, GenError> {
    let dims = self.dims();
    let mut out = vec![
      TraceLine::comment(format!("Instructions for Core {} (Rows {} to {})", core, range.start, range.end)),
      TraceLine::Instruction(Instruction::prog(core, MATMUL_FUNCTION)),
    ];

    for i in range.start..=range.end {
      out.push(TraceLine::comment(format!("Processing row {}", i)));
      // Reading A[i][0] points the core at output row i.
      Self::load(&mut out, core, self.layout.address_of(MatrixId::A, i, 0)?);

      for j in 0..dims.n {
        out.push(TraceLine::comment(format!("Computing element C[{}][{}]", i, j)));
        out.push(TraceLine::Instruction(Instruction::exe(core, MICRO_OP_CLEAR)));
        for k in 0..dims.k {
          Self::load(&mut out, core, self.layout.address_of(MatrixId::B, k, j)?);
          out.push(TraceLine::Instruction(Instruction::exe(core, MICRO_OP_MAC)));
        }
        Self::store(&mut out, core, self.layout.address_of(MatrixId::C, i, j)?);
      }
    }

    out.push(TraceLine::Instruction(Instruction::end(core)));
    Ok(out)
  }

  /// Header plus every core's program.
  pub fn lines(&self) -> Result<Vec<TraceLine>, GenError> {
    let dims = self.dims();
    let mut out = vec![
      TraceLine::comment("PIM Instructions for Matrix Multiplication"),
      TraceLine::comment(format!("Matrix dimensions: {}x{} * {}x{}", dims.m, dims.k, dims.k, dims.n)),
      TraceLine::comment(format!("Using {} cores", self.assignments.len())),
      TraceLine::Blank,
    ];
    for (&core, &range) in &self.assignments {
      if !matches!(out.last(), Some(TraceLine::Blank)) {
        out.push(TraceLine::Blank);
      }
      out.extend(self.core_sequence(core, range)?);
    }
    Ok(out)
  }

  pub fn instructions(&self) -> Result<Vec<u32>, GenError> {
    let lines = self.lines()?;
    Ok(
      lines
        .iter()
        .filter_map(|line| match line {
          TraceLine::Instruction(inst) => Some(inst.encode()),
          _ => None,
        })
        .collect(),
    )
  }

  pub fn render(&self) -> Result<String, GenError> {
    let lines = self.lines()?;
    let count = lines.iter().filter(|l| matches!(l, TraceLine::Instruction(_))).count();
    info!("Generated {} instructions ({} lines)", count, lines.len());
    Ok(lines.iter().map(|l| l.render() + "\n").collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_distribute_even_split() {
    let work = distribute_work(10, 4);
    assert_eq!(work.len(), 4);
    assert_eq!(work[&0], RowRange::new(0, 2));
    assert_eq!(work[&2], RowRange::new(6, 8));
    assert_eq!(work[&3], RowRange::new(9, 9));
  }

  #[test]
  fn test_distribute_skips_idle_cores() {
    // ceil(5/4) = 2 rows per core, so core 3 would start past the end
    let work = distribute_work(5, 4);
    assert_eq!(work.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(work[&2], RowRange::new(4, 4));
  }

  #[test]
  fn test_distribute_clamps_cores_to_rows() {
    let work = distribute_work(2, 8);
    assert_eq!(work.len(), 2);
    assert_eq!(work[&1], RowRange::new(1, 1));
  }

  #[test]
  fn test_core_sequence_shape() {
    let generator = TraceGenerator::new(MatrixDims::new(2, 2, 2), 1).unwrap();
    let seq = generator.core_sequence(0, RowRange::new(0, 0)).unwrap();
    let insts: Vec<Instruction> = seq
      .iter()
      .filter_map(|l| match l {
        TraceLine::Instruction(i) => Some(*i),
        _ => None,
      })
      .collect();
    // PROG, A load (2), per column: clear + K * (load 2 + MAC) + store 2, END
    assert_eq!(insts.len(), 1 + 2 + 2 * (1 + 2 * 3 + 2) + 1);
    assert_eq!(insts[0], Instruction::prog(0, MATMUL_FUNCTION));
    assert_eq!(insts[1], Instruction::load(0, 0));
    assert_eq!(insts[2], Instruction::exe(0, 0));
    assert_eq!(*insts.last().unwrap(), Instruction::end(0));
  }

  #[test]
  fn test_render_header() {
    let text = TraceGenerator::new(MatrixDims::new(3, 2, 4), 2).unwrap().render().unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# PIM Instructions for Matrix Multiplication"));
    assert_eq!(lines.next(), Some("# Matrix dimensions: 3x2 * 2x4"));
    assert_eq!(lines.next(), Some("# Using 2 cores"));
    assert!(text.contains("# Instructions for Core 1 (Rows 2 to 2)"));
    assert!(text.contains("020401 # Binary: 000000100000010000000001"));
  }

  #[test]
  fn test_rejects_unaddressable_layout() {
    // 600 x 512 A needs 600 memory rows, past the 9-bit address field
    assert!(matches!(
      TraceGenerator::new(MatrixDims::new(600, 512, 1), 1),
      Err(GenError::RowOutOfRange(_))
    ));
    assert!(matches!(TraceGenerator::new(MatrixDims::new(0, 1, 1), 1), Err(GenError::EmptyDimensions { .. })));
    assert!(matches!(TraceGenerator::new(MatrixDims::new(1, 1, 1), 0), Err(GenError::NoCores)));
  }

  #[test]
  fn test_rejects_too_many_cores() {
    assert!(matches!(TraceGenerator::new(MatrixDims::new(100, 1, 1), 100), Err(GenError::CoreOutOfRange(64))));
  }
}
