// Dense row-major i32 matrix used for inputs and results

use crate::error::SimError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MatrixId {
  A,
  B,
  C,
}

impl fmt::Display for MatrixId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      MatrixId::A => "A",
      MatrixId::B => "B",
      MatrixId::C => "C",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
  rows: usize,
  cols: usize,
  data: Vec<i32>,
}

impl Matrix {
  pub fn zeros(rows: usize, cols: usize) -> Self {
    Self { rows, cols, data: vec![0; rows * cols] }
  }

  pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> i32) -> Self {
    let mut data = Vec::with_capacity(rows * cols);
    for i in 0..rows {
      for j in 0..cols {
        data.push(f(i, j));
      }
    }
    Self { rows, cols, data }
  }

  /// Build from nested rows; every row must have the same length.
  pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, SimError> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    let count = rows.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
      return Err(SimError::RaggedMatrix { rows: count, cols, len: bad.len() });
    }
    let data: Vec<i32> = rows.into_iter().flatten().collect();
    Self::from_vec(count, cols, data)
  }

  pub fn from_vec(rows: usize, cols: usize, data: Vec<i32>) -> Result<Self, SimError> {
    if data.len() != rows * cols {
      return Err(SimError::RaggedMatrix { rows, cols, len: data.len() });
    }
    Ok(Self { rows, cols, data })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn get(&self, i: usize, j: usize) -> Option<i32> {
    if i < self.rows && j < self.cols {
      Some(self.data[i * self.cols + j])
    } else {
      None
    }
  }

  pub fn set(&mut self, i: usize, j: usize, value: i32) -> bool {
    if i < self.rows && j < self.cols {
      self.data[i * self.cols + j] = value;
      true
    } else {
      false
    }
  }

  pub fn row(&self, i: usize) -> Option<&[i32]> {
    if i >= self.rows {
      return None;
    }
    Some(&self.data[i * self.cols..(i + 1) * self.cols])
  }

  pub fn to_rows(&self) -> Vec<Vec<i32>> {
    (0..self.rows).map(|i| self.row(i).unwrap_or_default().to_vec()).collect()
  }

  /// Reference product with the same wrapping i32 arithmetic as the cores.
  /// Returns `None` when the inner dimensions differ.
  pub fn matmul(&self, other: &Matrix) -> Option<Matrix> {
    if self.cols != other.rows {
      return None;
    }
    Some(Matrix::from_fn(self.rows, other.cols, |i, j| {
      (0..self.cols).fold(0i32, |acc, p| {
        acc.wrapping_add(self.data[i * self.cols + p].wrapping_mul(other.data[p * other.cols + j]))
      })
    }))
  }
}

impl fmt::Display for Matrix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for i in 0..self.rows {
      let cells: Vec<String> = self.row(i).unwrap_or_default().iter().map(|v| format!("{:>6}", v)).collect();
      writeln!(f, "[{}]", cells.join(" "))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_rows_and_get() {
    let m = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    assert_eq!(m.rows(), 2);
    assert_eq!(m.cols(), 3);
    assert_eq!(m.get(1, 2), Some(6));
    assert_eq!(m.get(2, 0), None);
    assert_eq!(m.row(0), Some(&[1, 2, 3][..]));
    assert_eq!(m.row(2), None);
    assert_eq!(m.row(usize::MAX), None);
  }

  #[test]
  fn test_ragged_rows_rejected() {
    let err = Matrix::from_rows(vec![vec![1, 2], vec![3]]).unwrap_err();
    assert!(matches!(err, SimError::RaggedMatrix { cols: 2, len: 1, .. }));
  }

  #[test]
  fn test_matmul_reference() {
    let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
    let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
    let c = a.matmul(&b).unwrap();
    assert_eq!(c.to_rows(), vec![vec![19, 22], vec![43, 50]]);
    assert!(a.matmul(&Matrix::zeros(3, 1)).is_none());
  }
}
