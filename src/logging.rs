use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for diagnostic output on stderr.
///
/// Safe to call multiple times. The filter comes from `RUST_LOG`; `verbose`
/// falls back to `sencillo=debug` when `RUST_LOG` is unset. Without either,
/// no subscriber is installed.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) if verbose => EnvFilter::new("sencillo=debug"),
            Err(_) => return,
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
