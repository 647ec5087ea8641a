use thiserror::Error;

/// Exit code used when the sandbox failed before the agent ran.
pub const EXIT_SANDBOX_FAILURE: i32 = 125;

/// Exit code for invalid configuration input.
pub const EXIT_CONFIGURATION: i32 = 2;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Policy error: {0}")]
    Policy(#[from] awf_policy::PolicyError),

    #[error("Engine error: {0}")]
    Engine(#[from] awf_engine::EngineError),

    #[error("Log error: {0}")]
    Log(#[from] awf_logs::LogError),

    #[error("Docker error: {0}")]
    Docker(#[from] awf_docker::DockerError),

    #[error("Validation error: {0}")]
    Common(#[from] awf_types::CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map an error to the process exit code contract: configuration
    /// problems are 2, sandbox startup failures 125, everything else 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidInput(_)
            | CliError::Policy(_)
            | CliError::Common(_) => EXIT_CONFIGURATION,
            CliError::Engine(_) | CliError::Docker(_) => EXIT_SANDBOX_FAILURE,
            CliError::Log(_) | CliError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let err = CliError::InvalidInput("x".into());
        assert_eq!(err.exit_code(), EXIT_CONFIGURATION);

        let err = CliError::Engine(awf_engine::EngineError::Startup("boom".into()));
        assert_eq!(err.exit_code(), EXIT_SANDBOX_FAILURE);

        let err = CliError::Log(awf_logs::LogError::SourceNotFound("x".into()));
        assert_eq!(err.exit_code(), 1);
    }
}
