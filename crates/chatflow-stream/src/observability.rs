//! Process-wide `tracing` setup for binaries built on the decoder.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "warn";
const DEFAULT_LOG_FILE: &str = "chatflow.logs.jsonl";

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Disabled,
    /// Compact lines on stderr, leaving stdout to decoded output.
    Console,
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub output: LogOutput,
    /// `EnvFilter` directive.
    pub filter: String,
}

impl LogSettings {
    /// Reads `CHATFLOW_OBSERVABILITY_ENABLED`, `CHATFLOW_LOG_LEVEL`,
    /// `RUST_LOG` and `CHATFLOW_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("CHATFLOW_OBSERVABILITY_ENABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);
        let filter = lookup("CHATFLOW_LOG_LEVEL")
            .filter(|v| EnvFilter::try_new(v).is_ok())
            .or_else(|| lookup("RUST_LOG").filter(|v| EnvFilter::try_new(v).is_ok()))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let output = if !enabled {
            LogOutput::Disabled
        } else {
            match lookup("CHATFLOW_JSON_LOG_PATH").filter(|p| !p.trim().is_empty()) {
                Some(path) => LogOutput::JsonFile(PathBuf::from(path)),
                None => LogOutput::Console,
            }
        };
        Self { output, filter }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Installs the global subscriber from [`LogSettings::from_env`]. Only the
/// first call in a process has any effect.
pub fn init_observability() {
    INIT.get_or_init(|| install(LogSettings::from_env()));
}

fn install(settings: LogSettings) {
    let filter = EnvFilter::new(&settings.filter);
    match settings.output {
        LogOutput::Disabled => {}
        LogOutput::Console => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
        LogOutput::JsonFile(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let _ = std::fs::create_dir_all(dir);
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file_name));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
    }
}
