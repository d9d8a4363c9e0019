use log::LevelFilter;

/// Initializes the logger with the `env_logger` crate.
///
/// `RUST_LOG` controls the level; nothing is printed below `warn` by default.
pub fn init_logger() {
    init_logger_with_level(LevelFilter::Warn);
}

/// Initializes `env_logger` with `default` unless `RUST_LOG` overrides it.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger_with_level(default: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
