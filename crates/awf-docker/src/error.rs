use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionError(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Exec in container {0} failed: {1}")]
    ExecError(String, String),

    #[error("Network operation failed: {0}")]
    NetworkError(String),

    #[error("Image pull failed for {0}: {1}")]
    PullError(String, String),

    #[error("Docker API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DockerError>;
