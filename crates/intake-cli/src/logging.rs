use tracing_subscriber::EnvFilter;

use crate::cli::args::LogFormat;

/// Install the global subscriber. Logs go to stderr so stdout stays machine-readable.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("WARN: logging already initialised: {e}");
    }
}
