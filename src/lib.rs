pub mod config;
pub mod coredomain;
pub mod error;
pub mod global_decoder;
pub mod memdomain;
pub mod simulator;
pub mod trace;
pub mod utils;

pub use error::PimError;
pub use memdomain::{Matrix, MatrixDims, MatrixId};
pub use simulator::{PimSimulator, RowAssignments, RunResult};
