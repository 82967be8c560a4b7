// PIM Simulator core: replays an instruction trace against the cores and memory

pub mod report;
pub mod runner;
pub mod shell;

use crate::coredomain::{CoreState, NextOp, RowRange};
use crate::error::SimError;
use crate::global_decoder::instruction::{MICRO_OP_CLEAR, MICRO_OP_MAC};
use crate::global_decoder::{decode, parse_token, Instruction, Opcode};
use crate::memdomain::{Location, Matrix, MatrixId, Memory};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Core id → inclusive range of C rows.
pub type RowAssignments = BTreeMap<usize, RowRange>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
  CoreOutOfRange,
  InactiveCore,
}

/// What a single instruction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
  Noop,
  Programmed { function: u16 },
  LoadAddress { row: usize },
  StoreAddress { row: usize },
  Load { row: usize, offset: usize, value: i32, location: Option<Location> },
  Store { row: usize, offset: usize, value: i32, location: Option<Location> },
  Clear,
  Mac { a: i32, b: i32, accumulator: i32 },
  MacSkipped,
  UndefinedMicroOp { selector: u16 },
  Finished,
  Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepEvent {
  pub cycle: u64,
  pub raw: u32,
  pub inst: Instruction,
  pub effect: Effect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
  pub result: Matrix,
  pub cycles: u64,
  pub skipped: u64,
  pub incomplete_cores: Vec<usize>,
  pub rows_visited: BTreeMap<usize, BTreeSet<usize>>,
}

impl RunResult {
  pub fn all_completed(&self) -> bool {
    self.incomplete_cores.is_empty()
  }
}

pub struct PimSimulator {
  cores: Vec<CoreState>,
  memory: Memory,
  assignments: RowAssignments,
  cycle_count: u64,
  skipped: u64,
  rows_visited: BTreeMap<usize, BTreeSet<usize>>,
}

impl PimSimulator {
  pub fn new(num_cores: usize, a: &Matrix, b: &Matrix, assignments: RowAssignments) -> Result<Self, SimError> {
    let memory = Memory::new(a, b)?;
    let mut sim = Self {
      cores: (0..num_cores).map(CoreState::new).collect(),
      memory,
      assignments: RowAssignments::new(),
      cycle_count: 0,
      skipped: 0,
      rows_visited: BTreeMap::new(),
    };
    sim.initialize(&assignments);
    Ok(sim)
  }

  /// Attach row ranges and seed each core's current row: the start of its
  /// range, or its own id when it has none. Resets the cycle counters.
  pub fn initialize(&mut self, assignments: &RowAssignments) {
    self.assignments = assignments.clone();
    self.cycle_count = 0;
    self.skipped = 0;
    self.rows_visited.clear();

    for (&core_id, _) in assignments.range(self.cores.len()..) {
      warn!("Row assignment for core {} ignored: only {} cores available", core_id, self.cores.len());
    }

    for core in self.cores.iter_mut() {
      core.row_range = assignments.get(&core.id).copied();
      let row = match core.row_range {
        Some(range) => range.start,
        None => {
          debug!("No row range for core {}, using core id as row", core.id);
          core.id
        },
      };
      core.current_i = Some(row);
      self.rows_visited.entry(core.id).or_default().insert(row);
    }
  }

  pub fn num_cores(&self) -> usize {
    self.cores.len()
  }

  pub fn cores(&self) -> &[CoreState] {
    &self.cores
  }

  pub fn core(&self, id: usize) -> Option<&CoreState> {
    self.cores.get(id)
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn cycle_count(&self) -> u64 {
    self.cycle_count
  }

  pub fn skipped(&self) -> u64 {
    self.skipped
  }

  pub fn rows_visited(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
    &self.rows_visited
  }

  pub fn step_token(&mut self, token: &str) -> Result<StepEvent, SimError> {
    let raw = parse_token(token)?;
    self.step(raw)
  }

  /// Execute one instruction word. Recoverable problems are logged and
  /// reported as `Effect::Skipped`; only memory faults are errors.
  /// Skipped instructions are tallied but take no cycle, so their event
  /// carries the cycle of the last executed instruction.
  pub fn step(&mut self, raw: u32) -> Result<StepEvent, SimError> {
    let inst = decode(raw);
    let effect = self.dispatch(&inst)?;
    match effect {
      Effect::Skipped { .. } => self.skipped += 1,
      _ => self.cycle_count += 1,
    }
    Ok(StepEvent { cycle: self.cycle_count, raw, inst, effect })
  }

  /// Move a core to an explicitly announced row before its next instruction.
  pub fn apply_row_hint(&mut self, core_id: usize, row: usize) {
    let Some(core) = self.cores.get_mut(core_id) else {
      return;
    };
    if core.current_i != Some(row) {
      debug!("Core {} explicitly switching from row {:?} to row {}", core_id, core.current_i, row);
      core.current_i = Some(row);
      self.rows_visited.entry(core_id).or_default().insert(row);
    }
  }

  /// Execute a whole stream in order and collect the result.
  pub fn run<I>(&mut self, stream: I) -> Result<RunResult, SimError>
  where
    I: IntoIterator<Item = u32>,
  {
    let assignments = self.assignments.clone();
    self.initialize(&assignments);
    for raw in stream {
      self.step(raw)?;
    }
    self.finish()
  }

  /// End-of-run check and result snapshot. Incomplete cores are a warning.
  pub fn finish(&self) -> Result<RunResult, SimError> {
    for (core_id, rows) in &self.rows_visited {
      debug!("Core {} processed rows: {:?}", core_id, rows);
    }

    let incomplete_cores: Vec<usize> = self.cores.iter().filter(|c| !c.completed).map(|c| c.id).collect();
    if !incomplete_cores.is_empty() {
      warn!("Not all cores completed. Incomplete cores: {:?}", incomplete_cores);
    }

    let result = self.memory.snapshot_matrix(MatrixId::C)?;
    info!("Execution completed in {} cycles", self.cycle_count);

    Ok(RunResult {
      result,
      cycles: self.cycle_count,
      skipped: self.skipped,
      incomplete_cores,
      rows_visited: self.rows_visited.clone(),
    })
  }

  fn dispatch(&mut self, inst: &Instruction) -> Result<Effect, SimError> {
    if inst.core_id >= self.cores.len() {
      warn!("Instruction references core {} but only {} cores are available", inst.core_id, self.cores.len());
      return Ok(Effect::Skipped { reason: SkipReason::CoreOutOfRange });
    }

    match inst.opcode {
      Opcode::Noop => {
        debug!("Core {}: NOOP", inst.core_id);
        Ok(Effect::Noop)
      },
      Opcode::Prog => {
        debug!("Core {}: PROG func={} read={} write={}", inst.core_id, inst.addr, inst.read, inst.write);
        self.cores[inst.core_id].program(inst.addr);
        Ok(Effect::Programmed { function: inst.addr })
      },
      Opcode::Exe => self.execute(inst),
      Opcode::End => {
        debug!("Core {}: END", inst.core_id);
        self.cores[inst.core_id].finish();
        Ok(Effect::Finished)
      },
    }
  }

  fn execute(&mut self, inst: &Instruction) -> Result<Effect, SimError> {
    let Self { cores, memory, rows_visited, .. } = self;
    let core = &mut cores[inst.core_id];

    if !core.active {
      warn!("Executing on inactive core {}", core.id);
      return Ok(Effect::Skipped { reason: SkipReason::InactiveCore });
    }

    debug!("Core {}: EXE addr={} read={} write={}", core.id, inst.addr, inst.read, inst.write);
    let addr = inst.addr as usize;

    if inst.read {
      core.begin(NextOp::PendingRead, addr);
      return Ok(Effect::LoadAddress { row: addr });
    }
    if inst.write {
      core.begin(NextOp::PendingWrite, addr);
      return Ok(Effect::StoreAddress { row: addr });
    }

    match (core.next_operation, core.addr_register) {
      (NextOp::PendingRead, Some(row)) => {
        let location = memory.translate_address(row, addr);
        let value = memory.read(row, addr)?;
        core.next_operation = NextOp::None;

        match location {
          Some(Location { matrix: MatrixId::A, i, j }) => {
            // Only the first element of a row marks a new output row.
            if j == 0 && core.current_i != Some(i) {
              debug!("Core {}: Reading from matrix A, setting row index to {}", core.id, i);
              core.current_i = Some(i);
              rows_visited.entry(core.id).or_default().insert(i);
            }
            debug!("Core {}: Read A[{}][{}] = {}", core.id, i, j, value);
          },
          Some(Location { matrix: MatrixId::B, i, j }) => {
            core.current_k = Some(i);
            core.current_j = Some(j);
            core.current_b_value = Some(value);
            debug!("Core {}: Read B[{}][{}] = {}", core.id, i, j, value);
          },
          _ => debug!("Core {}: Read {} from row={} offset={}", core.id, value, row, addr),
        }
        Ok(Effect::Load { row, offset: addr, value, location })
      },
      (NextOp::PendingWrite, Some(row)) => {
        let location = memory.translate_address(row, addr);
        if let Some(Location { matrix: MatrixId::C, i, .. }) = location {
          if core.current_i != Some(i) {
            debug!("Core {}: Writing to C, updating row index from {:?} to {}", core.id, core.current_i, i);
            core.current_i = Some(i);
            rows_visited.entry(core.id).or_default().insert(i);
          }
        }
        memory.write(row, addr, core.accumulator)?;
        core.next_operation = NextOp::None;
        debug!("Core {}: Write {} to row={} offset={} ({:?})", core.id, core.accumulator, row, addr, location);
        Ok(Effect::Store { row, offset: addr, value: core.accumulator, location })
      },
      (NextOp::None, _) | (NextOp::PendingRead | NextOp::PendingWrite, None) => {
        core.next_operation = NextOp::None;
        Ok(micro_op(core, memory, inst.addr))
      },
    }
  }
}

fn micro_op(core: &mut CoreState, memory: &Memory, selector: u16) -> Effect {
  match selector {
    MICRO_OP_CLEAR => {
      core.accumulator = 0;
      debug!("Core {}: Clear accumulator", core.id);
      Effect::Clear
    },
    MICRO_OP_MAC => {
      let Some((i, k, b)) = core.mac_operands() else {
        debug!("Core {}: MAC: Missing matrix indices, skipping", core.id);
        return Effect::MacSkipped;
      };
      match memory.get_element(MatrixId::A, i, k) {
        Ok(a) => {
          let product = a.wrapping_mul(b);
          core.accumulator = core.accumulator.wrapping_add(product);
          debug!(
            "Core {}: MAC: {} += A[{}][{}]({}) * B[{}][{:?}]({}) = {}",
            core.id, core.accumulator, i, k, a, k, core.current_j, b, product
          );
          Effect::Mac { a, b, accumulator: core.accumulator }
        },
        Err(e) => {
          debug!("Core {}: MAC: {}", core.id, e);
          Effect::MacSkipped
        },
      }
    },
    other => {
      debug!("Core {}: undefined micro-op {}", core.id, other);
      Effect::UndefinedMicroOp { selector: other }
    },
  }
}
