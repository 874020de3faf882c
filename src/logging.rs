use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::lsp::trace::TraceMirrorLayer;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "debug", "info", "warn", "error")
    pub level: String,
    /// Optional log file path. If None, logs only to stderr
    pub file_path: Option<PathBuf>,
    /// Whether to use structured JSON format for file logs
    pub json_format: bool,
    /// Suppress the stderr layer entirely (stdio LSP transport owns stdout,
    /// and clients routinely merge stderr into the editor console)
    pub quiet_console: bool,
    /// Mirror log events to a connected LSP client as $/logTrace
    pub lsp_trace_mirror: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json_format: false,
            quiet_console: false,
            lsp_trace_mirror: false,
        }
    }
}

/// Translate one NCC_LOG_LEVEL severity name into a tracing filter directive.
///
/// The toolchain's severity ladder is wider than tracing's; the NOTICE and
/// CRITICAL..EMERGENCY bands collapse onto the nearest tracing level, and RAW
/// disables filtering altogether.
fn severity_to_directive(severity: &str) -> &'static str {
    match severity.to_ascii_uppercase().as_str() {
        "TRACE" | "RAW" => "trace",
        "DEBUG" => "debug",
        "INFO" | "NOTICE" => "info",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "ALERT" | "EMERGENCY" => "error",
        _ => "info",
    }
}

impl LogConfig {
    /// Create LogConfig from environment variables
    pub fn from_env() -> Self {
        let level = env::var("NCC_LOG_LEVEL")
            .map(|sev| severity_to_directive(&sev).to_string())
            .unwrap_or_else(|_| "info".to_string());

        let json_format = env::var("NCC_LOG_JSON").unwrap_or_default() == "true";

        Self {
            level,
            file_path: None,
            json_format,
            quiet_console: false,
            lsp_trace_mirror: false,
        }
    }

    /// Override values from CLI arguments
    pub fn with_overrides(mut self, level: Option<String>, file_path: Option<PathBuf>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(file_path) = file_path {
            self.file_path = Some(file_path);
        }
        self
    }

    /// Configure for hosting the LSP server: log to the given file, mirror
    /// events to the client, and (for stdio transports) silence stderr.
    pub fn for_lsp_server(mut self, log_file: PathBuf, stdio: bool) -> Self {
        self.file_path = Some(log_file);
        self.quiet_console = stdio;
        self.lsp_trace_mirror = true;
        self
    }
}

/// Initialize the logging system based on configuration
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_new(&config.level).or_else(|_| EnvFilter::try_new("info"))?;

    let file_layer = match &config.file_path {
        Some(file_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            if config.json_format {
                Some(
                    fmt::layer()
                        .json()
                        .with_writer(Arc::new(file))
                        .with_ansi(false)
                        .boxed(),
                )
            } else {
                Some(
                    fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .boxed(),
                )
            }
        }
        None => None,
    };

    let stderr_layer = if config.quiet_console {
        None
    } else {
        Some(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true)
                .with_target(true)
                .boxed(),
        )
    };

    let mirror_layer = config.lsp_trace_mirror.then(TraceMirrorLayer::new);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .with(mirror_layer)
        .init();

    Ok(())
}
