//! Diagnostics for ring buffer events.
//!
//! Enable with `--features tracing`. All trace macros become no-ops when
//! the feature is disabled, ensuring zero overhead in production.
//!
//! The only events the rings emit are overflow/underflow `warn!` lines, one
//! per failed bulk operation.

/// Initialize the tracing subscriber for ring diagnostics.
///
/// Call this at the start of tests or benchmarks to enable the output.
/// Does nothing if the `tracing` feature is not enabled.
///
/// The rings emit nothing below `warn`, so that is the default filter;
/// override with `RUST_LOG` (e.g. `RUST_LOG=scatter=warn`). Thread ids are
/// included because an overflow line is only actionable once you know which
/// producer or consumer thread hit it.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scatter=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

// When tracing is enabled, re-export the macro the rings use.
#[cfg(feature = "tracing")]
pub(crate) use tracing::warn;

// When tracing is disabled, provide a no-op implementation.
#[cfg(not(feature = "tracing"))]
macro_rules! warn_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use warn_noop as warn;
