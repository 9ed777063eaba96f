//! Structured logging setup.
//!
//! The router itself only emits `tracing` events. Binaries call
//! [`init_logging`] once at startup to install a subscriber configured by
//! [`LogConfig`]:
//! - JSON output for production, pretty output for development
//! - `EnvFilter` level and per-target directives
//! - sampling of low-severity events (warnings and errors are always kept)
//! - optional non-blocking output through `tracing_appender`
//!
//! | Variable | Default |
//! |---|---|
//! | `SWITCHYARD_LOG_LEVEL` | `info` |
//! | `SWITCHYARD_LOG_FORMAT` (`json` / `pretty`) | `json` |
//! | `SWITCHYARD_LOG_SAMPLING_MODE` (`all` / `error-only` / `sampled`) | `all` |
//! | `SWITCHYARD_LOG_SAMPLING_RATE` | `1.0` |
//! | `SWITCHYARD_LOG_ASYNC` | `true` |
//! | `SWITCHYARD_LOG_TARGET_FILTER` (e.g. `switchyard::router=debug`) | unset |
//! | `SWITCHYARD_LOG_INCLUDE_LOCATION` | `false` |
//!
//! `RUST_LOG`, when set, takes precedence over `SWITCHYARD_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::subscriber::Interest;
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Which events survive sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// WARN and ERROR only.
    ErrorOnly,
    /// Every WARN and ERROR, plus `sampling_rate` of everything else.
    Sampled,
}

impl SamplingMode {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    /// 0.0-1.0, used by [`SamplingMode::Sampled`]
    pub sampling_rate: f64,
    pub async_logging: bool,
    /// Extra `EnvFilter` directives, comma-separated.
    pub target_filter: Option<String>,
    pub include_location: bool,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("SWITCHYARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("SWITCHYARD_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            sampling_mode: SamplingMode::parse(
                &env::var("SWITCHYARD_LOG_SAMPLING_MODE").unwrap_or_else(|_| "all".to_string()),
            ),
            sampling_rate: env_parse("SWITCHYARD_LOG_SAMPLING_RATE", 1.0),
            async_logging: env_parse("SWITCHYARD_LOG_ASYNC", true),
            target_filter: env::var("SWITCHYARD_LOG_TARGET_FILTER").ok(),
            include_location: env_parse("SWITCHYARD_LOG_INCLUDE_LOCATION", false),
        }
    }

    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    #[must_use]
    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::Sampled,
            sampling_rate: 0.1,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }
}

/// Drops low-severity events according to [`SamplingMode`].
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    #[must_use]
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        self.should_sample_level(*metadata.level(), metadata.is_span())
    }

    /// Spans always pass so sampled-out events keep their context.
    fn should_sample_level(&self, level: Level, is_span: bool) -> bool {
        let severe = matches!(level, Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe || is_span,
            SamplingMode::Sampled => {
                if severe || is_span {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                let interval = (1.0 / self.sampling_rate) as u64;
                interval > 0 && count % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // Sampling decides per event, so callsite interest must not be cached.
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        match self.mode {
            SamplingMode::All => Interest::always(),
            _ => Interest::sometimes(),
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

/// Keeps the background writer alive; dropping it flushes pending lines.
#[must_use = "dropping the guard stops asynchronous log output"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let mut env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
            }
        }
    }

    let (writer, worker) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(LoggingGuard { _worker: worker })
}
