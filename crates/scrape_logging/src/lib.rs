#![deny(missing_docs)]
//! Logging facade for the scrape workspace.
//!
//! The `scrape_*` macros forward to [`log`] through a re-export, so callers
//! only depend on this crate. Binaries install the actual logger; tests call
//! [`initialize_for_tests`].

#[doc(hidden)]
pub use log as __log;

/// Emits through `log` at the given level. Backs the per-level macros.
#[macro_export]
macro_rules! scrape_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::__log::log!($crate::__log::Level::$level, $($arg)*)
    };
}

/// Trace-level message: per-event detail such as dispatched messages.
#[macro_export]
macro_rules! scrape_trace {
    ($($arg:tt)*) => { $crate::scrape_log!(Trace, $($arg)*) };
}

/// Debug-level message: connection lifecycle and request outcomes.
#[macro_export]
macro_rules! scrape_debug {
    ($($arg:tt)*) => { $crate::scrape_log!(Debug, $($arg)*) };
}

/// Info-level message.
#[macro_export]
macro_rules! scrape_info {
    ($($arg:tt)*) => { $crate::scrape_log!(Info, $($arg)*) };
}

/// Warn-level message: recoverable failures.
#[macro_export]
macro_rules! scrape_warn {
    ($($arg:tt)*) => { $crate::scrape_log!(Warn, $($arg)*) };
}

/// Error-level message.
#[macro_export]
macro_rules! scrape_error {
    ($($arg:tt)*) => { $crate::scrape_log!(Error, $($arg)*) };
}

/// Maps a `-v` count from the command line to a level filter.
///
/// Zero keeps the quiet default of `Warn`; each extra flag opens one level.
pub fn level_for_verbosity(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Installs a stderr logger for tests. Later calls are no-ops.
///
/// `SCRAPE_TEST_LOG=trace` (or any level name) raises the default `Debug`.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

    let level = std::env::var("SCRAPE_TEST_LOG")
        .ok()
        .and_then(|raw| raw.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Debug);
    let config = ConfigBuilder::new()
        .add_filter_allow_str("scrape")
        .build();

    // Another test may have installed the logger already.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never);
}
