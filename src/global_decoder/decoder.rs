// Global Decoder: splits a raw instruction word into its fields

use super::instruction::{
  Instruction, Opcode, ADDR_MASK, CORE_MASK, CORE_SHIFT, OPCODE_SHIFT, READ_SHIFT, WRITE_SHIFT,
};
use crate::error::SimError;

/// Decode a raw word. Every value decodes; bits above bit 18 are ignored.
pub fn decode(raw: u32) -> Instruction {
  Instruction {
    opcode: Opcode::from_bits(raw >> OPCODE_SHIFT),
    core_id: ((raw >> CORE_SHIFT) & CORE_MASK) as usize,
    read: (raw >> READ_SHIFT) & 1 != 0,
    write: (raw >> WRITE_SHIFT) & 1 != 0,
    addr: (raw & ADDR_MASK) as u16,
  }
}

/// Parse a hexadecimal instruction token, with or without a `0x` prefix.
pub fn parse_token(token: &str) -> Result<u32, SimError> {
  let digits = token
    .strip_prefix("0x")
    .or_else(|| token.strip_prefix("0X"))
    .unwrap_or(token);
  u32::from_str_radix(digits, 16).map_err(|_| SimError::MalformedInstruction(token.to_string()))
}

pub fn decode_token(token: &str) -> Result<Instruction, SimError> {
  parse_token(token).map(decode)
}

/// Six hex digits, the width the trace format uses.
pub fn format_word(raw: u32) -> String {
  format!("{:06x}", raw & 0xFF_FFFF)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_fields() {
    // EXE, core 5, read, addr 0x1ab
    let raw = (2 << 17) | (5 << 11) | (1 << 10) | 0x1ab;
    let inst = decode(raw);
    assert_eq!(inst.opcode, Opcode::Exe);
    assert_eq!(inst.core_id, 5);
    assert!(inst.read);
    assert!(!inst.write);
    assert_eq!(inst.addr, 0x1ab);
  }

  #[test]
  fn test_decode_opcodes() {
    assert_eq!(decode(0).opcode, Opcode::Noop);
    assert_eq!(decode(1 << 17).opcode, Opcode::Prog);
    assert_eq!(decode(2 << 17).opcode, Opcode::Exe);
    assert_eq!(decode(3 << 17).opcode, Opcode::End);
  }

  #[test]
  fn test_decode_max_core_and_write() {
    let inst = decode((3 << 17) | (63 << 11) | (1 << 9) | 511);
    assert_eq!(inst.core_id, 63);
    assert!(inst.write);
    assert!(!inst.read);
    assert_eq!(inst.addr, 511);
  }

  #[test]
  fn test_encode_matches_decode() {
    let inst = Instruction::store(17, 300);
    assert_eq!(decode(inst.encode()), inst);
    assert_eq!(Instruction::prog(0, 1).encode(), 0x020401);
    assert_eq!(Instruction::end(1).encode(), 0x060800);
  }

  #[test]
  fn test_parse_token() {
    assert_eq!(parse_token("020401").unwrap(), 0x020401);
    assert_eq!(parse_token("0x40402").unwrap(), 0x40402);
    assert!(matches!(parse_token("zz"), Err(SimError::MalformedInstruction(_))));
    assert!(parse_token("").is_err());
  }

  #[test]
  fn test_format_word() {
    assert_eq!(format_word(0x20401), "020401");
    assert_eq!(format_word(0), "000000");
  }
}
