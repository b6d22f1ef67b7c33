//! Shared diagnostics setup for the loglake workspace.
//!
//! Emits structured log events (level, timestamp, message) to standard
//! output and, when a log file is configured, mirrors them to disk.
//!
//! Usage:
//! - Set LOGLAKE_LOG=off - no logs
//! - Set LOGLAKE_LOG=info (default) - operational logs
//! - Set LOGLAKE_LOG=debug - detailed diagnostic logs

use std::path::Path;
use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Initialize diagnostics based on the LOGLAKE_LOG environment variable.
///
/// When `log_file` is given, events are mirrored there in addition to
/// standard output. Safe to call multiple times - subsequent calls are
/// ignored.
pub fn init_diagnostics(log_file: Option<&Path>) {
    INIT.call_once(|| {
        let log_level = std::env::var("LOGLAKE_LOG").unwrap_or_else(|_| "info".to_string());

        let min_level = match log_level.as_str() {
            "off" => return, // No setup needed
            "debug" => emit::Level::Debug,
            "info" => emit::Level::Info,
            "warn" => emit::Level::Warn,
            "error" => emit::Level::Error,
            other => {
                eprintln!("Warning: Unknown LOGLAKE_LOG value '{}', using 'info'", other);
                emit::Level::Info
            }
        };

        match log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    // emit_file reports its own write failures
                    let _ = std::fs::create_dir_all(parent);
                }
                let rt = emit::setup()
                    .emit_to(emit_term::stdout())
                    .and_emit_to(emit_file::set(path).spawn())
                    .emit_when(emit::level::min_filter(min_level))
                    .init();
                std::mem::forget(rt);
            }
            None => {
                let rt = emit::setup()
                    .emit_to(emit_term::stdout())
                    .emit_when(emit::level::min_filter(min_level))
                    .init();
                std::mem::forget(rt);
            }
        }
    });
}

// The wrappers forward tokens verbatim. Macro hygiene means template
// holes cannot reach the caller's locals on their own, so call sites
// pass each interpolated value as an explicit property:
// `info!("Processed: {count} objects", count)`.

/// Log basic operations (listing progress, flushes, merge results, etc.)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (record counts, per-object processing, etc.)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions (unroutable objects, retries, fallbacks)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures (fetch exhaustion, flush errors)
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
