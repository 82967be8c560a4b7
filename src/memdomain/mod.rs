// Mem Domain: matrices, their row-packed layout, and the memory holding them

pub mod layout;
pub mod matrix;
pub mod memory;

pub use layout::{Address, Location, MatrixDims, MemoryLayout, ROW_SIZE};
pub use matrix::{Matrix, MatrixId};
pub use memory::Memory;
