//! Process-wide `tracing` setup: stdout plus an optional daily-rolling log file.

use std::{io::IsTerminal, path::PathBuf};

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::TokenizationConfig;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_FILE_PREFIX: &str = "sgl-tokenizer-service";

/// Targets enabled at the configured level when `RUST_LOG` is unset
const FILTERED_TARGETS: [&str; 2] = ["sgl_tokenizer_service", "tower_http"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json_format: bool,
    pub log_dir: Option<String>,
}

impl LoggingConfig {
    pub fn from_config(config: &TokenizationConfig) -> Self {
        Self {
            level: parse_level(config.log_level.as_deref()),
            json_format: config.log_json,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// Keeps the file writer thread alive; drop it only on shutdown.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Parse a user supplied level string, falling back to INFO.
pub fn parse_level(level: Option<&str>) -> Level {
    level
        .and_then(|s| s.to_uppercase().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

fn default_filter(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    FILTERED_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn stdout_layer(json: bool) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(std::io::stdout().is_terminal())
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    if json {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.boxed()
    }
}

fn file_layer(log_dir: &str, json: bool) -> std::io::Result<(BoxedLayer, WorkerGuard)> {
    let log_dir = PathBuf::from(log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
        .with_writer(writer);
    let layer = if json {
        layer.json().flatten_event(true).boxed()
    } else {
        layer.boxed()
    };
    Ok((layer, guard))
}

pub fn init_logging(config: LoggingConfig) -> LogGuard {
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.level)));

    let mut layers = vec![stdout_layer(config.json_format)];
    let mut file_guard = None;

    if let Some(log_dir) = &config.log_dir {
        match file_layer(log_dir, config.json_format) {
            Ok((layer, guard)) => {
                layers.push(layer);
                file_guard = Some(guard);
            }
            // The subscriber is not up yet, so this cannot go through tracing
            Err(e) => eprintln!("Failed to open log directory {}: {}", log_dir, e),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
