use flexi_logger::{FlexiLoggerError, Logger, LoggerHandle};
use simple_error::SimpleError;
use std::error::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;
pub type BoxResult<T> = Result<T, BoxError>;

/// Starts logging to stdout. `RUST_LOG` wins over `spec` when set.
/// Keep the returned handle alive for the lifetime of the process.
pub fn init_log(spec: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(spec)?.log_to_stdout().start()
}

pub fn to_simple(e: BoxError) -> SimpleError {
    SimpleError::new(e.to_string())
}

/// Keeps the first occurrence of every key, in order.
pub fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(k.clone()))
        .collect()
}
