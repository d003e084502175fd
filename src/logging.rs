use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `chanvision=debug,sqlx=warn`.
    pub level: String,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Process-wide logging, live from `init` until `shutdown`.
#[derive(Debug)]
pub struct LogHandle {
    file: Option<Arc<File>>,
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(settings: &LogSettings) -> anyhow::Result<LogHandle> {
    let filter = EnvFilter::try_new(&settings.level)
        .with_context(|| format!("Invalid log level {:?}", settings.level))?;

    let Some(path) = &settings.file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;
        return Ok(LogHandle { file: None });
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {:?}", parent))?;
    }
    let file = Arc::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {:?}", path))?,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(file.clone())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;
    Ok(LogHandle { file: Some(file) })
}

impl LogHandle {
    /// Flushes the log file, if any.
    pub fn shutdown(self) -> std::io::Result<()> {
        if let Some(file) = self.file {
            file.sync_all()?;
        }
        Ok(())
    }
}
