// Per-core register file and control state

use serde::Serialize;
use std::fmt;

/// Inclusive range of C rows assigned to a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowRange {
  pub start: usize,
  pub end: usize,
}

impl RowRange {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  pub fn len(&self) -> usize {
    (self.end + 1).saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.end < self.start
  }
}

/// Second phase a core is waiting for after an addressed EXE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NextOp {
  #[default]
  None,
  PendingRead,
  PendingWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoreStatus {
  Unprogrammed,
  Active,
  Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreState {
  pub id: usize,
  pub active: bool,
  pub completed: bool,
  pub function: Option<u16>,
  pub row_range: Option<RowRange>,
  pub current_i: Option<usize>,
  pub current_k: Option<usize>,
  pub current_j: Option<usize>,
  pub current_b_value: Option<i32>,
  pub accumulator: i32,
  pub addr_register: Option<usize>,
  pub next_operation: NextOp,
}

impl CoreState {
  pub fn new(id: usize) -> Self {
    Self {
      id,
      active: false,
      completed: false,
      function: None,
      row_range: None,
      current_i: None,
      current_k: None,
      current_j: None,
      current_b_value: None,
      accumulator: 0,
      addr_register: None,
      next_operation: NextOp::None,
    }
  }

  /// Clear everything except the id.
  pub fn reset(&mut self) {
    *self = Self::new(self.id);
  }

  pub fn status(&self) -> CoreStatus {
    if self.active {
      CoreStatus::Active
    } else if self.completed {
      CoreStatus::Completed
    } else {
      CoreStatus::Unprogrammed
    }
  }

  pub fn program(&mut self, function: u16) {
    self.active = true;
    self.completed = false;
    self.function = Some(function);
  }

  /// First phase of a load or store: latch the memory row.
  pub fn begin(&mut self, op: NextOp, row: usize) {
    self.addr_register = Some(row);
    self.next_operation = op;
  }

  pub fn finish(&mut self) {
    self.active = false;
    self.completed = true;
    self.next_operation = NextOp::None;
  }

  pub fn mac_operands(&self) -> Option<(usize, usize, i32)> {
    Some((self.current_i?, self.current_k?, self.current_b_value?))
  }
}

impl fmt::Display for CoreState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn opt<T: fmt::Display>(v: Option<T>) -> String {
      v.map(|x| x.to_string()).unwrap_or_else(|| "-".to_string())
    }
    write!(
      f,
      "Core {:>2} | {:?} | i={} k={} j={} b={} acc={} next={:?}",
      self.id,
      self.status(),
      opt(self.current_i),
      opt(self.current_k),
      opt(self.current_j),
      opt(self.current_b_value),
      self.accumulator,
      self.next_operation
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_lifecycle() {
    let mut core = CoreState::new(3);
    assert_eq!(core.status(), CoreStatus::Unprogrammed);
    core.program(1);
    assert_eq!(core.status(), CoreStatus::Active);
    assert_eq!(core.function, Some(1));
    core.program(7);
    assert_eq!(core.function, Some(7));
    core.finish();
    assert_eq!(core.status(), CoreStatus::Completed);
    core.program(1);
    assert!(!core.completed);
  }

  #[test]
  fn test_begin_latches_row() {
    let mut core = CoreState::new(0);
    core.begin(NextOp::PendingWrite, 4);
    assert_eq!(core.addr_register, Some(4));
    assert_eq!(core.next_operation, NextOp::PendingWrite);
  }

  #[test]
  fn test_row_range_len() {
    assert_eq!(RowRange::new(2, 5).len(), 4);
    assert!(!RowRange::new(3, 3).is_empty());
    assert!(RowRange::new(4, 3).is_empty());
  }

  #[test]
  fn test_finish_abandons_pending() {
    let mut core = CoreState::new(0);
    core.program(1);
    core.begin(NextOp::PendingRead, 2);
    core.finish();
    assert_eq!(core.next_operation, NextOp::None);
  }

  #[test]
  fn test_mac_operands_require_all() {
    let mut core = CoreState::new(0);
    core.current_i = Some(1);
    core.current_k = Some(0);
    assert_eq!(core.mac_operands(), None);
    core.current_b_value = Some(-4);
    assert_eq!(core.mac_operands(), Some((1, 0, -4)));
  }

  #[test]
  fn test_reset_keeps_id() {
    let mut core = CoreState::new(9);
    core.program(1);
    core.accumulator = 12;
    core.reset();
    assert_eq!(core, CoreState::new(9));
  }
}
