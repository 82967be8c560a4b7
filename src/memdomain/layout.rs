// Memory layout: A, B and C packed back-to-back into fixed-size rows

use super::matrix::MatrixId;
use crate::error::SimError;
use serde::Serialize;

/// Elements per memory row.
pub const ROW_SIZE: usize = 512;

/// C = A(M×K) · B(K×N)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixDims {
  pub m: usize,
  pub k: usize,
  pub n: usize,
}

impl MatrixDims {
  pub fn new(m: usize, k: usize, n: usize) -> Self {
    Self { m, k, n }
  }

  /// (rows, cols) of one of the three matrices.
  pub fn shape(&self, matrix: MatrixId) -> (usize, usize) {
    match matrix {
      MatrixId::A => (self.m, self.k),
      MatrixId::B => (self.k, self.n),
      MatrixId::C => (self.m, self.n),
    }
  }

  pub fn elements(&self, matrix: MatrixId) -> usize {
    let (rows, cols) = self.shape(matrix);
    rows * cols
  }

  /// Memory rows needed to hold A, B and C, or `None` when the count does
  /// not fit in a `usize`.
  pub fn memory_rows(&self) -> Option<usize> {
    [MatrixId::A, MatrixId::B, MatrixId::C].iter().try_fold(0usize, |total, &matrix| {
      let (rows, cols) = self.shape(matrix);
      total.checked_add(rows.checked_mul(cols)?.div_ceil(ROW_SIZE))
    })
  }
}

/// Logical coordinate of a memory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
  pub matrix: MatrixId,
  pub i: usize,
  pub j: usize,
}

/// Physical address of a memory cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Address {
  pub row: usize,
  pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
  pub base: usize,
  pub rows: usize,
  pub elements: usize,
}

impl Region {
  fn new(base: usize, elements: usize) -> Self {
    Self { base, rows: elements.div_ceil(ROW_SIZE), elements }
  }

  pub fn end(&self) -> usize {
    self.base + self.rows
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryLayout {
  dims: MatrixDims,
  a: Region,
  b: Region,
  c: Region,
}

impl MemoryLayout {
  pub fn new(dims: MatrixDims) -> Result<Self, SimError> {
    for matrix in [MatrixId::A, MatrixId::B, MatrixId::C] {
      if dims.elements(matrix) == 0 {
        return Err(SimError::EmptyMatrix(matrix));
      }
    }
    let a = Region::new(0, dims.elements(MatrixId::A));
    let b = Region::new(a.end(), dims.elements(MatrixId::B));
    let c = Region::new(b.end(), dims.elements(MatrixId::C));
    Ok(Self { dims, a, b, c })
  }

  pub fn dims(&self) -> MatrixDims {
    self.dims
  }

  pub fn region(&self, matrix: MatrixId) -> Region {
    match matrix {
      MatrixId::A => self.a,
      MatrixId::B => self.b,
      MatrixId::C => self.c,
    }
  }

  pub fn base(&self, matrix: MatrixId) -> usize {
    self.region(matrix).base
  }

  pub fn total_rows(&self) -> usize {
    self.c.end()
  }

  /// Forward translation, validated against the matrix's declared shape.
  pub fn address_of(&self, matrix: MatrixId, i: usize, j: usize) -> Result<Address, SimError> {
    let (rows, cols) = self.dims.shape(matrix);
    if i >= rows || j >= cols {
      return Err(SimError::ElementOutOfBounds { matrix, i, j });
    }
    let linear = i * cols + j;
    Ok(Address { row: self.base(matrix) + linear / ROW_SIZE, offset: linear % ROW_SIZE })
  }

  /// Inverse translation. The region is picked by comparing `row` against
  /// the B and C bases; addresses in a region's trailing padding, past the
  /// last row, or with an offset outside a row resolve to nothing.
  pub fn translate(&self, row: usize, offset: usize) -> Option<Location> {
    if offset >= ROW_SIZE || row >= self.total_rows() {
      return None;
    }
    let (matrix, region) = if row < self.b.base {
      (MatrixId::A, self.a)
    } else if row < self.c.base {
      (MatrixId::B, self.b)
    } else {
      (MatrixId::C, self.c)
    };
    let linear = (row - region.base) * ROW_SIZE + offset;
    if linear >= region.elements {
      return None;
    }
    let (_, cols) = self.dims.shape(matrix);
    Some(Location { matrix, i: linear / cols, j: linear % cols })
  }
}
