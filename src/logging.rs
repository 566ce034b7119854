use anyhow::Result;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable consulted after `RUST_LOG`.
pub fn log_env() -> String {
    format!("{}_LOGLEVEL", env!("CARGO_CRATE_NAME").to_uppercase())
}

/// Filter directive used when neither environment variable is set.
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("{}={level}", env!("CARGO_CRATE_NAME"))
}

/// Initializes stderr logging using the tracing subscriber.
///
/// Results go to stdout, so everything logged here stays out of piped output.
pub fn initialize_logging(verbosity: u8) -> Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(log_env()))
        .unwrap_or_else(|_| default_directive(verbosity));

    let stderr_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::try_new(log_level)?);

    tracing_subscriber::registry()
        .with(stderr_subscriber)
        .try_init()?;

    Ok(())
}
