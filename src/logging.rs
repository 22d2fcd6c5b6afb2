//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//! Logs go to stderr; stdout is reserved for command output such as partition handles.
//!
//! - `RUST_LOG` wins when set; otherwise the level follows `ETL_ENV`
//!   (debug for development and test, info for production)
//! - `ETL_LOG_FORMAT=json` switches to one JSON object per line
//! - ANSI colors only when stderr is a terminal

use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for console logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("ETL_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize console logging. Safe to call more than once; only the first call
/// installs a subscriber, and an already-installed global subscriber is kept.
pub fn init_tracing() {
    init_tracing_with_level(None);
}

/// Same as [`init_tracing`] with an explicit level directive (e.g. from `-v` flags)
/// that takes precedence over the environment-derived default.
pub fn init_tracing_with_level(level_override: Option<&str>) {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = match level_override {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment))),
        };
        let format = LogFormat::from_env();
        let use_ansi = IsTerminal::is_terminal(&std::io::stderr());

        let console_layer = match format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                ansi_colors = use_ansi,
                json = format == LogFormat::Json,
                "Console logging initialized"
            );
        }
    });
}

fn get_environment() -> String {
    std::env::var("ETL_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Whole milliseconds for a log field, saturating at `u64::MAX`
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
