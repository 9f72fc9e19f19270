//! Subscriber setup for binaries and harnesses
//!
//! The library itself only emits `tracing` events; installing a
//! subscriber is left to whoever owns the process.

use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct LogInitError(String);

/// Build the filter: `RUST_LOG` wins over `default_directives`
#[must_use]
pub fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Map a `-v` count to filter directives
#[must_use]
pub fn directives_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a global fmt subscriber
pub fn init(default_directives: &str, format: LogFormat) -> Result<(), LogInitError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(default_directives))
        .with_target(false)
        .with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|err| LogInitError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(directives_for_verbosity(0), "warn");
        assert_eq!(directives_for_verbosity(2), "debug");
        assert_eq!(directives_for_verbosity(9), "trace");
    }

    #[test]
    fn second_init_reports_error() {
        let _ = init("warn", LogFormat::Text);
        assert!(init("warn", LogFormat::Text).is_err());
    }
}
