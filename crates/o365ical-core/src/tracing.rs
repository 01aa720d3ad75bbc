//! Tracing setup for o365ical
//!
//! Every crate logs through `tracing`; the binary installs one subscriber at
//! startup with [`init_tracing`]. `RUST_LOG` wins over the configured level.
//!
//! ```ignore
//! use o365ical_core::tracing::{init_tracing, TracingConfig};
//!
//! // Behind a reverse proxy, shipping logs to a collector:
//! init_tracing(TracingConfig::daemon())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Crates whose events are shown at the configured level. Everything else
/// is limited to warnings.
const OWN_TARGETS: [&str; 5] = [
    "o365ical",
    "o365ical_core",
    "o365ical_providers",
    "o365ical_server",
    "tower_http",
];

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),

    /// The filter directive does not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, for log collectors.
    Json,
}

impl std::str::FromStr for TracingOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{}`", other)),
        }
    }
}

/// How the daemon logs.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level of our own crates when `RUST_LOG` is unset.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Source file and line on every event.
    pub with_location: bool,
    /// Also log span open/close (request lifetimes).
    pub span_events: bool,
    /// Full filter directive; replaces `level` and `RUST_LOG`.
    pub directives: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Pretty,
            with_location: false,
            span_events: false,
            directives: None,
        }
    }
}

impl TracingConfig {
    /// Verbose single-line output for local runs.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: TracingOutputFormat::Compact,
            with_location: true,
            ..Self::default()
        }
    }

    /// JSON output with request spans for a deployed feed.
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            format: TracingOutputFormat::Json,
            span_events: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match self.directives {
            Some(ref directives) => Ok(EnvFilter::try_new(directives)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(self.level)))),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_file(self.with_location)
            .with_line_number(self.with_location)
            .with_span_events(spans);

        match self.format {
            TracingOutputFormat::Pretty => layer.pretty().boxed(),
            // Timestamps come from the terminal or the journal.
            TracingOutputFormat::Compact => layer.compact().without_time().boxed(),
            TracingOutputFormat::Json => layer.json().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once, at startup.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()?;
    Ok(())
}

fn default_directive(level: Level) -> String {
    let mut directive: Vec<String> = OWN_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    directive.push("warn".to_string());
    directive.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles() {
        let config = TracingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, TracingOutputFormat::Pretty);
        assert!(config.directives.is_none());

        let debug = TracingConfig::debug();
        assert_eq!(debug.level, Level::DEBUG);
        assert_eq!(debug.format, TracingOutputFormat::Compact);
        assert!(debug.with_location);

        let daemon = TracingConfig::daemon();
        assert_eq!(daemon.level, Level::INFO);
        assert_eq!(daemon.format, TracingOutputFormat::Json);
        assert!(daemon.span_events);
    }

    #[test]
    fn builders() {
        let config = TracingConfig::default()
            .with_level(Level::WARN)
            .with_format(TracingOutputFormat::Json)
            .with_env_filter("o365ical_server=trace");

        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, TracingOutputFormat::Json);
        assert!(config.filter().is_ok());
    }

    #[test]
    fn bad_directive_is_rejected() {
        let config = TracingConfig::default().with_env_filter("o365ical_server=loud");
        assert!(matches!(config.filter(), Err(TracingError::Filter(_))));
    }

    #[test]
    fn default_directive_scopes_our_crates() {
        let directive = default_directive(Level::DEBUG);
        assert!(directive.starts_with("o365ical=DEBUG,"));
        assert!(directive.contains("o365ical_server=DEBUG"));
        assert!(directive.ends_with(",warn"));
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn format_names() {
        assert_eq!("json".parse::<TracingOutputFormat>(), Ok(TracingOutputFormat::Json));
        assert_eq!("Compact".parse::<TracingOutputFormat>(), Ok(TracingOutputFormat::Compact));
        assert!("xml".parse::<TracingOutputFormat>().is_err());
    }
}
