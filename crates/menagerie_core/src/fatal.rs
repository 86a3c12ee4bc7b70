//! Top-level fatal failure handling.
//!
//! A half-injected host must not keep running: callers at the outermost
//! layer route pipeline failures here, which log the full cause chain, flush
//! the log sinks and exit.

use crate::logging::{flush_logging, sanitize_message};
use log::error;
use std::error::Error;

/// Exit status used for fatal injection failures (`EX_SOFTWARE`).
pub const FATAL_EXIT_CODE: i32 = 70;

const MAX_CAUSE_CHARS: usize = 512;

/// Rendered messages of `err` and each of its sources, outermost first.
pub fn error_chain(err: &dyn Error) -> Vec<String> {
    let mut chain = vec![sanitize_message(&err.to_string(), MAX_CAUSE_CHARS)];
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push(sanitize_message(&cause.to_string(), MAX_CAUSE_CHARS));
        current = cause.source();
    }
    chain
}

/// Logs `err` with its causes, flushes logging and exits the process.
pub fn terminate(context: &str, err: &dyn Error) -> ! {
    for (depth, cause) in error_chain(err).iter().enumerate() {
        error!("event=fatal module=fatal status=error context={context} depth={depth} cause={cause}");
    }
    flush_logging();
    eprintln!("fatal: {context}: {err}");
    std::process::exit(FATAL_EXIT_CODE)
}

/// Unwraps `result` or terminates the process with its error.
pub fn or_terminate<T, E: Error>(context: &str, result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => terminate(context, &err),
    }
}
