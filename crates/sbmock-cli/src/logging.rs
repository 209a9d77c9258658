//! Logging setup for the `sbmock` binary.
//!
//! The core library only emits `tracing` events. This module installs the
//! subscriber: human-readable lines by default, JSON lines with `--json`.
//! Everything goes to stderr so command output on stdout stays parseable.

use sbmock_core::Config;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level selected by the `-v` count: 0 = INFO, 1 = DEBUG, 2+ = TRACE.
fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` is honored; the `-v` level is added on top for `sbmock_*`
/// targets. JSON lines look like:
///
/// ```json
/// {"timestamp":"...","level":"INFO","fields":{"message":"Mock declarations refreshed","mocks":2},"target":"sbmock_core::mocking::registry","span":{"cmd":"watch","name":"watch"}}
/// ```
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init(config: &Config) {
    let level = level_for(config.verbosity);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(
            format!("sbmock={level}")
                .parse()
                .unwrap_or_else(|_| level.into()),
        );

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), Level::INFO);
        assert_eq!(level_for(1), Level::DEBUG);
        assert_eq!(level_for(5), Level::TRACE);
    }
}
