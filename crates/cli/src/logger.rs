use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber, `RUST_LOG` overrides the default `info`
/// level. Logs go to stderr, rendered output to stdout.
pub(crate) fn init(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = fmt::layer().with_target(true).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry().with(env_filter).with(base.json()).init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(base).init();
    }
}
