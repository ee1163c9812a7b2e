//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,cadence=debug,gpu_allocator=warn";

/// Installs the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` when present, otherwise [`DEFAULT_FILTER`].
/// Calling this more than once is harmless; later calls are ignored.
///
/// # Example
/// ```
/// cadence_core::init_logging();
/// tracing::info!("frame loop starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging();
        init_logging();
    }
}
