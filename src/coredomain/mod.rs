// Core Domain: per-core state machines

pub mod state;

pub use state::{CoreState, CoreStatus, NextOp, RowRange};
