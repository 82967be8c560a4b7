// Trace: instruction file parsing, generation and the matrices fed to a run

pub mod generator;
pub mod parser;
pub mod source;
pub mod tac;
pub mod workload;

pub use generator::{distribute_work, TraceGenerator, TraceLine};
pub use parser::{load_trace, parse_trace, TraceEntry, TraceFile};
pub use source::{load_source, scan_dimensions, SourceDims};
pub use tac::{render_three_address, three_address_code};
pub use workload::{generate, Workload};
