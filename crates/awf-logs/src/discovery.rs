//! Enumerating and validating access-log sources

use crate::error::{LogError, Result};
use awf_docker::ContainerManager;
use awf_types::{ENV_LOGS_DIR, PRESERVED_DIR_PREFIX, PROXY_CONTAINER};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an access log can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// The live proxy container.
    Running { container: String },
    /// A directory on disk containing an `access.log`.
    Preserved {
        path: PathBuf,
        /// Unix milliseconds recovered from the directory name or mtime.
        timestamp_ms: Option<i64>,
    },
}

impl LogSource {
    pub fn running() -> Self {
        LogSource::Running {
            container: PROXY_CONTAINER.to_string(),
        }
    }

    pub fn preserved(path: PathBuf) -> Self {
        let timestamp_ms = timestamp_from_dir(&path);
        LogSource::Preserved { path, timestamp_ms }
    }

    /// Path of the access log for preserved sources.
    pub fn access_log_path(&self) -> Option<PathBuf> {
        match self {
            LogSource::Running { .. } => None,
            LogSource::Preserved { path, .. } => Some(path.join("access.log")),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LogSource::Running { container } => {
                format!("running sandbox (container {})", container)
            }
            LogSource::Preserved { path, timestamp_ms } => match timestamp_ms
                .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
            {
                Some(when) => format!(
                    "{} ({})",
                    path.display(),
                    when.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => path.display().to_string(),
            },
        }
    }
}

/// Recover the preservation timestamp from a `squid-logs-<ms>` basename,
/// falling back to the directory's mtime.
fn timestamp_from_dir(path: &Path) -> Option<i64> {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(ms) = name.strip_prefix(PRESERVED_DIR_PREFIX) {
            if let Ok(ms) = ms.parse::<i64>() {
                return Some(ms);
            }
        }
    }
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

fn has_access_log(dir: &Path) -> bool {
    dir.join("access.log").is_file()
}

/// Resolve a directory that may hold the log directly or nested under
/// `squid-logs/`.
fn resolve_log_dir(dir: &Path) -> Option<PathBuf> {
    if has_access_log(dir) {
        return Some(dir.to_path_buf());
    }
    let nested = dir.join("squid-logs");
    if has_access_log(&nested) {
        return Some(nested);
    }
    None
}

pub struct LogDiscovery {
    containers: ContainerManager,
}

impl LogDiscovery {
    pub fn new() -> Result<Self> {
        Ok(Self {
            containers: ContainerManager::new()?,
        })
    }

    /// Enumerate available sources: the running sandbox first, then
    /// preserved directories newest first. Scan failures mean "no preserved
    /// sources", never an error.
    pub async fn enumerate(&self) -> Vec<LogSource> {
        let mut sources = Vec::new();

        if self.containers.is_running(PROXY_CONTAINER).await {
            sources.push(LogSource::running());
        }

        let mut preserved = Vec::new();
        if let Ok(dir) = std::env::var(ENV_LOGS_DIR) {
            if let Some(resolved) = resolve_log_dir(Path::new(&dir)) {
                preserved.push(LogSource::preserved(resolved));
            } else {
                debug!(dir = %dir, "{} does not contain an access.log", ENV_LOGS_DIR);
            }
        }
        preserved.extend(Self::scan_temp_dir());

        preserved.sort_by_key(|source| match source {
            LogSource::Preserved { timestamp_ms, .. } => std::cmp::Reverse(*timestamp_ms),
            LogSource::Running { .. } => std::cmp::Reverse(None),
        });
        preserved.dedup();
        sources.extend(preserved);
        sources
    }

    /// Preserved-log directories under the system temp area.
    fn scan_temp_dir() -> Vec<LogSource> {
        let Ok(entries) = std::fs::read_dir(std::env::temp_dir()) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                if !name.starts_with(PRESERVED_DIR_PREFIX) {
                    return None;
                }
                let path = entry.path();
                if !has_access_log(&path) {
                    return None;
                }
                Some(LogSource::preserved(path))
            })
            .collect()
    }

    /// Prefer the running sandbox, otherwise the newest preserved source.
    pub async fn most_recent(&self) -> Option<LogSource> {
        self.enumerate().await.into_iter().next()
    }

    /// Validate a user-supplied source selection.
    ///
    /// Accepts the literal keyword `running`, a directory containing an
    /// `access.log` (directly or nested), or a file path whose parent
    /// becomes the source.
    pub async fn validate(&self, selection: &str) -> Result<LogSource> {
        if selection == "running" {
            if !self.containers.is_running(PROXY_CONTAINER).await {
                return Err(LogError::ProxyNotRunning(PROXY_CONTAINER.to_string()));
            }
            return Ok(LogSource::running());
        }

        let path = Path::new(selection);
        if path.is_dir() {
            return match resolve_log_dir(path) {
                Some(resolved) => Ok(LogSource::preserved(resolved)),
                None => Err(LogError::MissingAccessLog(path.join("access.log"))),
            };
        }
        if path.is_file() {
            let parent = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(LogSource::preserved(parent));
        }

        Err(LogError::SourceNotFound(selection.to_string()))
    }

    /// Human-readable source listing, with a hint naming the environment
    /// variable when nothing was found.
    pub async fn format_listing(&self) -> String {
        let sources = self.enumerate().await;
        if sources.is_empty() {
            return format!(
                "No log sources found. Run a sandbox first, or point {} at a \
                 preserved log directory.\n",
                ENV_LOGS_DIR
            );
        }

        let mut out = String::from("Available log sources:\n");
        for (i, source) in sources.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, source.describe()));
        }
        out
    }
}
