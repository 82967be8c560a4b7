// Global logging configuration
use log::LevelFilter;

/// Install the `env_logger` backend at `level`. `RUST_LOG` still wins when set.
/// Repeated calls keep the first logger.
pub fn init_log(level: LevelFilter) {
  let _ = env_logger::Builder::new()
    .filter_level(level)
    .parse_default_env()
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}
