use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging for one harness run.
///
/// The subscriber is installed as the default for the current thread and
/// removed again when the context is dropped. `RUST_LOG` overrides the level
/// picked from the `debug` flag.
pub struct LogContext {
    _guard: DefaultGuard,
}

impl LogContext {
    pub fn new(debug: bool) -> Self {
        let default = if debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        Self::with_filter(filter)
    }

    pub fn with_filter(filter: EnvFilter) -> Self {
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter);
        Self {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}
