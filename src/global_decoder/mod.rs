// Global Decoder: 19-bit PIM instruction words

pub mod decoder;
pub mod instruction;

pub use decoder::{decode, decode_token, format_word, parse_token};
pub use instruction::{Instruction, Opcode};
