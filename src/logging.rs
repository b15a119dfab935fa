//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogFormat, LoggingSection};

pub const LOG_ENV: &str = "PRODYO_LOG";

static INIT: Once = Once::new();

/// `PRODYO_LOG` when set and parseable, else the configured directives, else
/// the built-in default.
pub fn build_filter(config: &LoggingSection) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::default_log_filter()))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(config: &LoggingSection) {
    INIT.call_once(|| {
        let filter = build_filter(config);
        let registry = tracing_subscriber::registry().with(filter);
        match config.format {
            LogFormat::Fmt => registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .init(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_filter_falls_back() {
        let config = LoggingSection {
            format: LogFormat::Fmt,
            filter: "prodyo=shouting".to_string(),
        };
        if std::env::var(LOG_ENV).is_err() {
            let filter = build_filter(&config);
            assert_eq!(
                filter.max_level_hint(),
                Some(tracing_subscriber::filter::LevelFilter::INFO)
            );
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingSection::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
