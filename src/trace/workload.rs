// Workload: synthetic input matrices

use crate::memdomain::{Matrix, MatrixDims};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Range of random element values, kept small for readable debugging.
pub const RANDOM_MIN: i32 = -10;
pub const RANDOM_MAX: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
  /// Uniform values in `RANDOM_MIN..=RANDOM_MAX`; entropy-seeded without a seed.
  Random { seed: Option<u64> },
  /// A[i][j] = i + j, B[i][j] = i - j
  Deterministic,
}

pub fn generate(dims: MatrixDims, workload: Workload) -> (Matrix, Matrix) {
  match workload {
    Workload::Random { seed } => {
      let mut rng = match seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
      };
      let a = Matrix::from_fn(dims.m, dims.k, |_, _| rng.gen_range(RANDOM_MIN..=RANDOM_MAX));
      let b = Matrix::from_fn(dims.k, dims.n, |_, _| rng.gen_range(RANDOM_MIN..=RANDOM_MAX));
      (a, b)
    },
    Workload::Deterministic => {
      let a = Matrix::from_fn(dims.m, dims.k, |i, j| (i + j) as i32);
      let b = Matrix::from_fn(dims.k, dims.n, |i, j| i as i32 - j as i32);
      (a, b)
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deterministic_pattern() {
    let (a, b) = generate(MatrixDims::new(2, 3, 2), Workload::Deterministic);
    assert_eq!(a.to_rows(), vec![vec![0, 1, 2], vec![1, 2, 3]]);
    assert_eq!(b.to_rows(), vec![vec![0, -1], vec![1, 0], vec![2, 1]]);
  }

  #[test]
  fn test_seeded_is_reproducible() {
    let dims = MatrixDims::new(4, 5, 6);
    let first = generate(dims, Workload::Random { seed: Some(42) });
    let second = generate(dims, Workload::Random { seed: Some(42) });
    assert_eq!(first, second);
    assert_eq!(first.0.rows(), 4);
    assert_eq!(first.1.cols(), 6);
  }

  #[test]
  fn test_random_range() {
    let (a, b) = generate(MatrixDims::new(8, 8, 8), Workload::Random { seed: Some(7) });
    for m in [a, b] {
      for row in m.to_rows() {
        assert!(row.iter().all(|v| (RANDOM_MIN..=RANDOM_MAX).contains(v)));
      }
    }
  }
}
