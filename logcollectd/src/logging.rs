//! Logging initialization for logcollectd.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `LogcollectConfig`. Supports JSON structured logging and
//! human-readable pretty format.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logcollect_core::config::GeneralConfig;

/// Build the level filter.
///
/// `RUST_LOG` takes precedence; otherwise the configured level applies
/// (already raised to `debug` by `-v`).
pub fn build_filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default)
/// * `"pretty"` - Human-readable output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = build_filter(config);

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[test]
    #[serial_test::serial]
    fn rust_log_overrides_configured_level() {
        let config = GeneralConfig {
            log_level: "debug".to_owned(),
            log_format: "json".to_owned(),
        };

        // SAFETY: serialized test, no other thread reads the environment
        unsafe { std::env::set_var("RUST_LOG", "warn") };
        let filter = build_filter(&config);
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(filter.to_string(), "warn");

        assert_eq!(build_filter(&config).to_string(), "debug");
    }
}
