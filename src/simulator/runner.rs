// Runner: drives a parsed trace through the engine, in continuous or step mode

use super::report::{log_report, validate, write_report, RunReport, ValidationReport};
use super::shell::{Command, Shell};
use super::{PimSimulator, RunResult, StepEvent};
use crate::error::PimError;
use crate::global_decoder::format_word;
use crate::memdomain::Matrix;
use crate::trace::{generate, load_trace, TraceEntry, TraceFile, Workload};
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
  pub step_mode: StepMode,
  /// JSON-lines record of every executed instruction.
  pub trace_file: Option<PathBuf>,
  pub workload: Workload,
  pub validate: bool,
  pub report_file: Option<PathBuf>,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      step_mode: StepMode::Continuous,
      trace_file: None,
      workload: Workload::Random { seed: None },
      validate: true,
      report_file: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
  pub a: Matrix,
  pub b: Matrix,
  pub run: RunResult,
  pub validation: Option<ValidationReport>,
}

impl Outcome {
  pub fn passed(&self) -> bool {
    self.validation.as_ref().map_or(true, |v| v.passed)
  }
}

fn write_event(writer: &mut dyn Write, sim: &PimSimulator, event: &StepEvent) -> Result<(), PimError> {
  let entry = serde_json::json!({
    "cycle": event.cycle,
    "raw": format_word(event.raw),
    "opcode": event.inst.opcode.to_string(),
    "core": event.inst.core_id,
    "read": event.inst.read,
    "write": event.inst.write,
    "addr": event.inst.addr,
    "effect": event.effect,
    "accumulator": sim.core(event.inst.core_id).map(|c| c.accumulator),
  });
  writeln!(writer, "{}", entry)?;
  Ok(())
}

fn print_cores(sim: &PimSimulator) {
  println!("cycle {} ({} skipped)", sim.cycle_count(), sim.skipped());
  for core in sim.cores() {
    println!("  {}", core);
  }
}

/// Execute trace entries in order. Row hints take effect before the next
/// instruction. In step mode the shell decides how far to advance; quitting
/// stops early and still reports what has been computed.
pub fn execute(
  sim: &mut PimSimulator,
  entries: &[TraceEntry],
  step_mode: StepMode,
  mut trace_writer: Option<&mut dyn Write>,
) -> Result<RunResult, PimError> {
  let mut shell = match step_mode {
    StepMode::Step => {
      println!("Step mode - Press Enter to step, 'c' to continue, 'q' to quit");
      Some(Shell::new()?)
    },
    StepMode::Continuous => None,
  };
  let mut budget: u32 = 0;

  'entries: for entry in entries {
    let raw = match *entry {
      TraceEntry::RowHint { core_id, row, .. } => {
        sim.apply_row_hint(core_id, row);
        continue;
      },
      TraceEntry::Instruction { raw, .. } => raw,
    };

    let mut resume = false;
    if let Some(sh) = shell.as_mut() {
      while budget == 0 && !resume {
        match sh.read_command()? {
          Command::Step(n) => budget = n,
          Command::Continue => resume = true,
          Command::Info => print_cores(sim),
          Command::Quit => break 'entries,
        }
      }
      budget = budget.saturating_sub(1);
    }
    if resume {
      shell = None;
    }

    let event = sim.step(raw)?;
    if shell.is_some() {
      println!("[{}] {} ({}) -> {:?}", event.cycle, format_word(event.raw), event.inst, event.effect);
    }
    if let Some(writer) = trace_writer.as_mut() {
      write_event(&mut **writer, sim, &event)?;
    }
  }

  if let Some(writer) = trace_writer.as_mut() {
    writer.flush()?;
  }
  Ok(sim.finish()?)
}

/// Simulate an already parsed trace on matrices from `options.workload`.
pub fn run_trace(trace: &TraceFile, options: &RunOptions) -> Result<Outcome, PimError> {
  let (a, b) = generate(trace.dims, options.workload);
  debug!("Matrix A:\n{}", a);
  debug!("Matrix B:\n{}", b);

  let mut sim = PimSimulator::new(trace.num_cores, &a, &b, trace.row_assignments.clone())?;

  info!("Executing {} PIM instructions...", trace.instruction_count());
  let run = match &options.trace_file {
    Some(path) => {
      let mut writer = BufWriter::new(File::create(path)?);
      let run = execute(&mut sim, &trace.entries, options.step_mode, Some(&mut writer))?;
      info!("Instruction trace written to {}", path.display());
      run
    },
    None => execute(&mut sim, &trace.entries, options.step_mode, None)?,
  };
  info!("Result Matrix C:\n{}", run.result);
  if run.skipped > 0 {
    info!("{} instructions skipped", run.skipped);
  }

  let validation = if options.validate {
    info!("Validating result...");
    let (expected, report) = validate(&a, &b, &run.result)?;
    log_report(&expected, &run.result, &report);
    Some(report)
  } else {
    None
  };

  if let Some(path) = &options.report_file {
    let report = RunReport {
      dims: trace.dims,
      num_cores: trace.num_cores,
      instructions: trace.instruction_count(),
      run: &run,
      validation: validation.as_ref(),
    };
    write_report(path, &report)?;
  }

  Ok(Outcome { a, b, run, validation })
}

pub fn run_file(path: &std::path::Path, options: &RunOptions) -> Result<Outcome, PimError> {
  let trace = load_trace(path)?;
  run_trace(&trace, options)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coredomain::RowRange;
  use crate::global_decoder::Instruction;
  use crate::memdomain::MatrixDims;
  use crate::simulator::RowAssignments;
  use crate::trace::TraceGenerator;

  fn entries(insts: &[Instruction]) -> Vec<TraceEntry> {
    insts
      .iter()
      .enumerate()
      .map(|(line, inst)| TraceEntry::Instruction { line: line + 1, raw: inst.encode() })
      .collect()
  }

  #[test]
  fn test_execute_writes_json_lines() {
    let a = Matrix::from_rows(vec![vec![2]]).unwrap();
    let b = Matrix::from_rows(vec![vec![3]]).unwrap();
    let mut sim = PimSimulator::new(1, &a, &b, RowAssignments::new()).unwrap();
    let program = entries(&[
      Instruction::prog(0, 1),
      Instruction::exe(0, 0),
      Instruction::load(0, 1),
      Instruction::exe(0, 0),
      Instruction::exe(0, 2),
      Instruction::store(0, 2),
      Instruction::exe(0, 0),
      Instruction::end(0),
    ]);

    let mut out: Vec<u8> = Vec::new();
    let run = execute(&mut sim, &program, StepMode::Continuous, Some(&mut out)).unwrap();
    assert_eq!(run.result.get(0, 0), Some(6));
    assert!(run.all_completed());

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0]["opcode"], "PROG");
    assert_eq!(lines[0]["raw"], "020401");
    assert_eq!(lines[4]["accumulator"], 6);
    assert_eq!(lines[7]["cycle"], 8);
  }

  #[test]
  fn test_execute_applies_row_hints() {
    let a = Matrix::from_rows(vec![vec![1], vec![5]]).unwrap();
    let b = Matrix::from_rows(vec![vec![3]]).unwrap();
    let mut sim = PimSimulator::new(1, &a, &b, RowAssignments::new()).unwrap();
    let mut program = vec![TraceEntry::RowHint { line: 1, core_id: 0, row: 1 }];
    program.extend(entries(&[
      Instruction::prog(0, 1),
      Instruction::exe(0, 0),
      Instruction::load(0, 1),
      Instruction::exe(0, 0),
      Instruction::exe(0, 2),
    ]));
    execute(&mut sim, &program, StepMode::Continuous, None).unwrap();
    assert_eq!(sim.core(0).unwrap().accumulator, 15);
  }

  #[test]
  fn test_run_trace_validates_generated_program() {
    let dims = MatrixDims::new(5, 3, 4);
    let generator = TraceGenerator::new(dims, 2).unwrap();
    let trace = TraceFile {
      dims,
      num_cores: 2,
      row_assignments: generator.assignments().clone(),
      entries: generator
        .instructions()
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(line, raw)| TraceEntry::Instruction { line: line + 1, raw })
        .collect(),
    };
    let options = RunOptions { workload: Workload::Random { seed: Some(3) }, ..RunOptions::default() };
    let outcome = run_trace(&trace, &options).unwrap();
    assert!(outcome.passed());
    assert_eq!(outcome.run.result, outcome.a.matmul(&outcome.b).unwrap());
    assert_eq!(trace.row_assignments[&1], RowRange::new(3, 4));
  }
}
