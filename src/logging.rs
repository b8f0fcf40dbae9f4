//! Logging setup for embedders that do not install their own subscriber.
//!
//! Every module logs through `tracing` with the manager, wallet or transfer id
//! as a field, so a single filter such as `RUST_LOG=walletcore::manager=debug`
//! follows one manager's sync passes and submissions.

use tracing_subscriber::{fmt, EnvFilter};

/// Set to `1` for JSON log lines.
pub const LOG_JSON_ENV: &str = "WALLETCORE_LOG_JSON";

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
/// A no-op when one is already installed.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var(LOG_JSON_ENV)
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}
