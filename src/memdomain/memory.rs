// Memory model: row-addressed storage holding A, B and C

use super::layout::{Location, MatrixDims, MemoryLayout, ROW_SIZE};
use super::matrix::{Matrix, MatrixId};
use crate::error::SimError;

#[derive(Debug, Clone)]
pub struct Memory {
  layout: MemoryLayout,
  rows: Vec<[i32; ROW_SIZE]>,
}

impl Memory {
  /// Lay out A and B; C starts zeroed.
  pub fn new(a: &Matrix, b: &Matrix) -> Result<Self, SimError> {
    if a.cols() != b.rows() {
      return Err(SimError::DimensionMismatch { m: a.rows(), k: a.cols(), k2: b.rows(), n: b.cols() });
    }
    let layout = MemoryLayout::new(MatrixDims::new(a.rows(), a.cols(), b.cols()))?;
    let mut memory = Self { layout, rows: vec![[0; ROW_SIZE]; layout.total_rows()] };
    memory.store_matrix(MatrixId::A, a)?;
    memory.store_matrix(MatrixId::B, b)?;
    Ok(memory)
  }

  fn store_matrix(&mut self, matrix: MatrixId, data: &Matrix) -> Result<(), SimError> {
    for i in 0..data.rows() {
      for (j, &value) in data.row(i).unwrap_or_default().iter().enumerate() {
        self.set_element(matrix, i, j, value)?;
      }
    }
    Ok(())
  }

  pub fn layout(&self) -> &MemoryLayout {
    &self.layout
  }

  pub fn dims(&self) -> MatrixDims {
    self.layout.dims()
  }

  pub fn total_rows(&self) -> usize {
    self.rows.len()
  }

  fn check(&self, row: usize, offset: usize) -> Result<(), SimError> {
    if row >= self.rows.len() || offset >= ROW_SIZE {
      return Err(SimError::AddressOutOfBounds { row, offset, rows: self.rows.len() });
    }
    Ok(())
  }

  pub fn read(&self, row: usize, offset: usize) -> Result<i32, SimError> {
    self.check(row, offset)?;
    Ok(self.rows[row][offset])
  }

  pub fn write(&mut self, row: usize, offset: usize, value: i32) -> Result<(), SimError> {
    self.check(row, offset)?;
    self.rows[row][offset] = value;
    Ok(())
  }

  pub fn get_element(&self, matrix: MatrixId, i: usize, j: usize) -> Result<i32, SimError> {
    let addr = self.layout.address_of(matrix, i, j)?;
    self.read(addr.row, addr.offset)
  }

  pub fn set_element(&mut self, matrix: MatrixId, i: usize, j: usize, value: i32) -> Result<(), SimError> {
    let addr = self.layout.address_of(matrix, i, j)?;
    self.write(addr.row, addr.offset, value)
  }

  pub fn translate_address(&self, row: usize, offset: usize) -> Option<Location> {
    self.layout.translate(row, offset)
  }

  /// Rebuild a whole matrix from memory.
  pub fn snapshot_matrix(&self, matrix: MatrixId) -> Result<Matrix, SimError> {
    let (rows, cols) = self.dims().shape(matrix);
    let mut out = Matrix::zeros(rows, cols);
    for i in 0..rows {
      for j in 0..cols {
        out.set(i, j, self.get_element(matrix, i, j)?);
      }
    }
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn small() -> Memory {
    let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
    let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
    Memory::new(&a, &b).unwrap()
  }

  #[test]
  fn test_matrices_stored_row_major() {
    let mem = small();
    assert_eq!(mem.total_rows(), 3);
    assert_eq!(mem.read(0, 0).unwrap(), 1);
    assert_eq!(mem.read(0, 3).unwrap(), 4);
    assert_eq!(mem.read(1, 1).unwrap(), 6);
    assert_eq!(mem.get_element(MatrixId::B, 1, 0).unwrap(), 7);
    assert_eq!(mem.snapshot_matrix(MatrixId::C).unwrap(), Matrix::zeros(2, 2));
  }

  #[test]
  fn test_dimension_mismatch() {
    let a = Matrix::zeros(2, 3);
    let b = Matrix::zeros(2, 2);
    assert_eq!(
      Memory::new(&a, &b).unwrap_err(),
      SimError::DimensionMismatch { m: 2, k: 3, k2: 2, n: 2 }
    );
  }

  #[test]
  fn test_raw_access_out_of_bounds() {
    let mut mem = small();
    assert!(matches!(mem.read(3, 0), Err(SimError::AddressOutOfBounds { row: 3, .. })));
    assert!(matches!(mem.read(0, ROW_SIZE), Err(SimError::AddressOutOfBounds { .. })));
    assert!(mem.write(3, 0, 1).is_err());
    assert!(mem.write(2, ROW_SIZE, 1).is_err());
    // last valid cell still works
    mem.write(2, ROW_SIZE - 1, 9).unwrap();
    assert_eq!(mem.read(2, ROW_SIZE - 1).unwrap(), 9);
  }

  #[test]
  fn test_set_element_isolated() {
    let mut mem = small();
    mem.set_element(MatrixId::C, 1, 1, 50).unwrap();
    assert_eq!(mem.get_element(MatrixId::C, 1, 1).unwrap(), 50);
    assert_eq!(mem.snapshot_matrix(MatrixId::A).unwrap().to_rows(), vec![vec![1, 2], vec![3, 4]]);
    assert_eq!(mem.snapshot_matrix(MatrixId::B).unwrap().to_rows(), vec![vec![5, 6], vec![7, 8]]);
    assert!(mem.set_element(MatrixId::C, 2, 0, 1).is_err());
  }
}
