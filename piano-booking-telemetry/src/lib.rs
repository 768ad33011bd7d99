use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_LOG_LEVEL: &str = "info,hyper=info,rustls=warn";

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => DEFAULT_LOG_LEVEL.into(),
        1 => "debug,hyper=info,rustls=warn".into(),
        _ => "trace".into(),
    })
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// Log lines go to stderr so command output on stdout stays machine readable.
pub fn setup_telemetry(verbose: u8) {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if let Err(error) = tracing_subscriber::registry()
        .with(stderr_log.with_filter(env_filter(verbose)))
        .try_init()
    {
        tracing::debug!("subscriber already installed: {error}");
    }
}
