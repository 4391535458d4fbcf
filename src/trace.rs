//! Feature-gated tracing macros.
//!
//! With the `tracing` feature this re-exports the `tracing` macros the crate
//! uses; without it the same names expand to nothing.
//!
//! ```rust,ignore
//! #[cfg(feature = "tracing")]
//! use crate::trace::{debug, debug_span};
//!
//! #[cfg(feature = "tracing")]
//! let _span = debug_span!("fixpoint", queued = n).entered();
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, trace, Span};

#[cfg(not(feature = "tracing"))]
mod noop {
    /// Span stand-in.
    pub struct Span;

    impl Span {
        pub fn none() -> Self {
            Span
        }

        pub fn entered(self) -> SpanGuard {
            SpanGuard
        }
    }

    pub struct SpanGuard;

    #[macro_export]
    macro_rules! trace {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($tt:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug_span {
        ($($tt:tt)*) => {
            $crate::trace::Span::none()
        };
    }

    pub use crate::{debug, debug_span, trace};
}

#[cfg(not(feature = "tracing"))]
pub use noop::*;

/// Environment variable holding the log filter, e.g. `FDLOG_LOG=fdlog=trace`.
pub const LOG_ENV: &str = "FDLOG_LOG";

/// Install a stderr subscriber filtered by [`LOG_ENV`] (default `warn`).
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}

#[cfg(test)]
#[path = "tests/trace.rs"]
mod tests;
