//! Tracing setup for the CLI

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "STOREFRONT_LOG";

/// Filter used when STOREFRONT_LOG is unset or invalid
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize tracing with the STOREFRONT_LOG environment variable.
///
/// Falls back to "debug" when verbose, "info" otherwise. Logs go to stderr so
/// the text and JSON reports on stdout stay clean.
pub fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
