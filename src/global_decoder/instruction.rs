// PIM instruction word: 19-bit fields

use serde::Serialize;
use std::fmt;

pub const OPCODE_SHIFT: u32 = 17;
pub const CORE_SHIFT: u32 = 11;
pub const READ_SHIFT: u32 = 10;
pub const WRITE_SHIFT: u32 = 9;

pub const OPCODE_MASK: u32 = 0x3;
pub const CORE_MASK: u32 = 0x3F;
pub const ADDR_MASK: u32 = 0x1FF;

/// Highest core id the 6-bit core field can address.
pub const MAX_CORE_ID: usize = CORE_MASK as usize;
/// Highest value the 9-bit address field can carry.
pub const MAX_ADDR: usize = ADDR_MASK as usize;

/// EXE micro-op selectors, used when no load/store is pending.
pub const MICRO_OP_CLEAR: u16 = 0;
pub const MICRO_OP_MAC: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Opcode {
  Noop,
  Prog,
  Exe,
  End,
}

impl Opcode {
  pub fn from_bits(bits: u32) -> Self {
    match bits & OPCODE_MASK {
      0 => Opcode::Noop,
      1 => Opcode::Prog,
      2 => Opcode::Exe,
      _ => Opcode::End,
    }
  }

  pub fn bits(self) -> u32 {
    match self {
      Opcode::Noop => 0,
      Opcode::Prog => 1,
      Opcode::Exe => 2,
      Opcode::End => 3,
    }
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Opcode::Noop => "NOOP",
      Opcode::Prog => "PROG",
      Opcode::Exe => "EXE",
      Opcode::End => "END",
    };
    f.write_str(name)
  }
}

/// A decoded instruction. `addr` is a memory row, an offset, a function
/// selector or a micro-op selector depending on the core's protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction {
  pub opcode: Opcode,
  pub core_id: usize,
  pub read: bool,
  pub write: bool,
  pub addr: u16,
}

impl Instruction {
  pub fn noop() -> Self {
    Self::new(Opcode::Noop, 0, false, false, 0)
  }

  pub fn prog(core_id: usize, function: u16) -> Self {
    Self::new(Opcode::Prog, core_id, true, false, function)
  }

  pub fn load(core_id: usize, row: u16) -> Self {
    Self::new(Opcode::Exe, core_id, true, false, row)
  }

  pub fn store(core_id: usize, row: u16) -> Self {
    Self::new(Opcode::Exe, core_id, false, true, row)
  }

  /// Offset phase of a load/store, or a micro-op when nothing is pending.
  pub fn exe(core_id: usize, addr: u16) -> Self {
    Self::new(Opcode::Exe, core_id, false, false, addr)
  }

  pub fn end(core_id: usize) -> Self {
    Self::new(Opcode::End, core_id, false, false, 0)
  }

  pub fn new(opcode: Opcode, core_id: usize, read: bool, write: bool, addr: u16) -> Self {
    Self { opcode, core_id, read, write, addr }
  }

  /// Pack into a 19-bit word. Fields wider than their slot are masked.
  pub fn encode(&self) -> u32 {
    (self.opcode.bits() << OPCODE_SHIFT)
      | ((self.core_id as u32 & CORE_MASK) << CORE_SHIFT)
      | ((self.read as u32) << READ_SHIFT)
      | ((self.write as u32) << WRITE_SHIFT)
      | (self.addr as u32 & ADDR_MASK)
  }
}

impl fmt::Display for Instruction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} core={} r={} w={} addr={}",
      self.opcode, self.core_id, self.read as u8, self.write as u8, self.addr
    )
  }
}
