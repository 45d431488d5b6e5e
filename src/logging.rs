//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the verbosity flag.
pub const LOG_ENV: &str = "KESTREL_LOG";

/// Filter directive for a `-v` count.
pub fn directive_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "kestrel=warn",
        1 => "kestrel=debug",
        _ => "kestrel=trace",
    }
}

/// Install the global fmt subscriber on stderr. Call once.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directive_for(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
