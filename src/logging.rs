use std::fs::OpenOptions;

use env_logger::{Builder, Env, Target};
use pingora::{ErrorType::*, OrErr, Result};

use crate::config::Log;

pub const DEFAULT_LOG_FILTER: &str = "info,pingora_core=warn";

/// Installs the process-wide logger.
///
/// Writes to stderr unless a log file is configured. `RUST_LOG` overrides the configured level.
pub fn init(log: Option<&Log>) -> Result<()> {
    let filter = log
        .and_then(|cfg| cfg.level.as_deref())
        .unwrap_or(DEFAULT_LOG_FILTER);
    let mut builder = Builder::from_env(Env::default().default_filter_or(filter));

    if let Some(cfg) = log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.path)
            .or_err_with(FileOpenError, || format!("Unable to open log file {}", cfg.path))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .or_err(InternalError, "Logger already initialized")
}
