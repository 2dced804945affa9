#![warn(clippy::all, rust_2018_idioms)]

/// Tracing macros that prefix every message with `[file:module:line]`.
///
/// The merge engine logs per-page and per-stream progress through these so a
/// `--verbose` run shows exactly which stage produced a line.
#[macro_export]
macro_rules! trace_trace {
    ($($arg:tt)*) => {
        tracing::trace!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        tracing::info!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_warn {
    ($($arg:tt)*) => {
        tracing::warn!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_error {
    ($($arg:tt)*) => {
        tracing::error!("[{}:{}:{}] {}", file!(), module_path!(), line!(), format!($($arg)*));
    };
}

/*
Log level guidelines for cwtail:

TRACE: per-event detail
- Individual event selection inside the merge loop
- Raw page sizes and forward tokens

DEBUG: per-page and per-stream progress
- Page fetches for groups, streams and events
- Adapter state changes (caught up, exhausted, re-armed)
- Driver state transitions

INFO: run milestones
- Number of groups/streams discovered
- Run completion with event counts

WARN: suspicious but recoverable situations
- No streams matched the patterns
- Credentials resolved from instance metadata

ERROR: the run is about to fail
- Remote API errors that abort the merge

Everything goes to stderr so stdout carries only log events.
*/
