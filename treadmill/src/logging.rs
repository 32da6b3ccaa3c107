//! Development-time tracing.
//!
//! Operator output lives in [`report`](crate::report); this module only
//! configures diagnostics on stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How chatty diagnostics should be when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Verbose,
    Debug,
}

impl Verbosity {
    fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Verbose => "warn,treadmill=info",
            Verbosity::Debug => "info,treadmill=debug",
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `verbosity`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=treadmill=debug treadmill --sync
/// ```
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
