use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber used by the binaries. `RUST_LOG` takes
/// precedence; otherwise `verbose` selects `info` over `warn`.
pub fn init(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second install (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
