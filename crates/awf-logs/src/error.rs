use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Access log not found at {0}")]
    MissingAccessLog(PathBuf),

    #[error("Log source not found: {0}")]
    SourceNotFound(String),

    #[error("Proxy container {0} is not running")]
    ProxyNotRunning(String),

    #[error("Docker error: {0}")]
    Docker(#[from] awf_docker::DockerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;
