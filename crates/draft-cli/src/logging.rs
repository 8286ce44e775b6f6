use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "DRAFTCMD_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber. Stdout belongs to the session, so logs
/// never go there. A second call is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(filter_from_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
