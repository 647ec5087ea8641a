use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Network creation, image availability, proxy start/readiness, or init
    /// rule installation failed. The sandbox never reached the agent.
    #[error("Sandbox startup failed: {0}")]
    Startup(String),

    /// The agent container itself failed to start.
    #[error("Agent startup failed: {0}")]
    Runtime(String),

    #[error("Docker error: {0}")]
    Docker(#[from] awf_docker::DockerError),

    #[error("Network planning error: {0}")]
    Network(#[from] awf_network::NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
