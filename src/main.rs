use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use pimsim::config::{load_and_merge_configs, CliOverrides};
use pimsim::simulator::runner::run_file;
use pimsim::trace::{load_source, render_three_address, SourceDims, TraceGenerator};
use pimsim::utils::log::init_log;
use pimsim::PimError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// pimsim - Processing-in-Memory matrix multiplication simulator
#[derive(Parser, Debug)]
#[command(name = "pimsim")]
#[command(version = "0.1.0")]
#[command(about = "Trace-driven PIM simulator for C = A x B", long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Execute an instruction trace and validate the result
  Run(RunArgs),
  /// Generate an instruction trace from a matmul source file or explicit dimensions
  Gen(GenArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
  /// Instruction trace file
  #[arg(value_name = "TRACE")]
  trace: PathBuf,

  /// TOML config merged over the built-in defaults
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,

  /// Per-instruction debug output
  #[arg(short, long)]
  verbose: bool,

  /// Output JSON-lines trace of executed instructions
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Use A[i][j] = i+j, B[i][j] = i-j instead of random matrices
  #[arg(long)]
  deterministic: bool,

  /// Random seed for matrix generation
  #[arg(long)]
  seed: Option<u64>,

  /// Skip result validation
  #[arg(long)]
  no_validate: bool,

  /// Write a JSON run report
  #[arg(long, value_name = "FILE")]
  report: Option<String>,
}

#[derive(clap::Args, Debug)]
struct GenArgs {
  /// C/C++ source declaring M, K and N
  #[arg(value_name = "SOURCE")]
  source: Option<PathBuf>,

  /// Rows of A (overrides the source)
  #[arg(short, value_name = "M")]
  m: Option<usize>,

  /// Columns of A / rows of B (overrides the source)
  #[arg(short, value_name = "K")]
  k: Option<usize>,

  /// Columns of B (overrides the source)
  #[arg(short, value_name = "N")]
  n: Option<usize>,

  /// Number of PIM cores
  #[arg(short, long, default_value_t = 4)]
  cores: usize,

  /// Output file (stdout when omitted); three-address code goes to FILE.tac
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,
}

fn run(args: RunArgs) -> Result<bool, PimError> {
  let cli = CliOverrides {
    quiet: args.quiet,
    verbose: args.verbose,
    step: args.step,
    trace_file: args.trace_file,
    deterministic: args.deterministic,
    seed: args.seed,
    no_validate: args.no_validate,
    report_file: args.report,
  };
  let config = load_and_merge_configs(args.config.as_deref(), &cli)?;
  init_log(config.log_level());

  let outcome = run_file(&args.trace, &config.run_options())?;
  Ok(outcome.passed())
}

fn generate_trace(args: GenArgs) -> Result<bool, PimError> {
  init_log(if args.quiet { LevelFilter::Warn } else { LevelFilter::Info });

  let found = match &args.source {
    Some(path) => load_source(path)?,
    None => SourceDims::default(),
  };
  let overrides = SourceDims { m: args.m, k: args.k, n: args.n };
  let dims = found.resolve(overrides);
  info!("Matrix dimensions: {}x{} * {}x{}", dims.m, dims.k, dims.k, dims.n);

  let generator = TraceGenerator::new(dims, args.cores)?;
  let text = generator.render()?;
  match args.output {
    Some(path) => {
      let mut tac_path = path.clone().into_os_string();
      tac_path.push(".tac");
      let tac_path = PathBuf::from(tac_path);
      fs::write(&tac_path, render_three_address(dims))?;
      info!("Three-address code written to {}", tac_path.display());
      fs::write(&path, text)?;
      info!("Trace written to {}", path.display());
    },
    None => print!("{}", text),
  }
  Ok(true)
}

fn main() -> ExitCode {
  let args = Args::parse();

  let result = match args.command {
    Commands::Run(run_args) => run(run_args),
    Commands::Gen(gen_args) => generate_trace(gen_args),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::from(2),
    Err(e) => {
      init_log(LevelFilter::Error);
      error!("{}", e);
      ExitCode::FAILURE
    },
  }
}
