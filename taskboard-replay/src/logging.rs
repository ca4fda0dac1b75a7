use log::SetLoggerError;

/// Install env_logger on stderr. `RUST_LOG` overrides the `info` default.
pub fn init() -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .try_init()
}
