use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DockerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Exited(i64),
    NotFound,
    Unknown(String),
}

/// Combined output and exit status of an exec inside a container.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub output: String,
    pub exit_code: i64,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Clone)]
pub struct ContainerManager {
    docker: Docker,
}

impl ContainerManager {
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::ConnectionError(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub async fn inspect_container(&self, name: &str) -> Result<ContainerInspectResponse> {
        self.docker
            .inspect_container(name, None)
            .await
            .map_err(|_| DockerError::ContainerNotFound(name.to_owned()))
    }

    pub async fn create_container(&self, name: &str, config: Config<String>) -> Result<String> {
        let options = CreateContainerOptions {
            name,
            ..Default::default()
        };
        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    pub async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    pub async fn stop_container(&self, name: &str, timeout: Option<i64>) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.unwrap_or(10),
        };
        self.docker.stop_container(name, Some(options)).await?;
        Ok(())
    }

    pub async fn remove_container(&self, name: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };
        self.docker.remove_container(name, Some(options)).await?;
        Ok(())
    }

    pub async fn container_exists(&self, name: &str) -> bool {
        self.inspect_container(name).await.is_ok()
    }

    pub async fn get_container_status(&self, name: &str) -> Result<ContainerStatus> {
        let status = match self.inspect_container(name).await {
            Ok(info) => {
                if let Some(state) = info.state {
                    if state.running.unwrap_or(false) {
                        ContainerStatus::Running
                    } else if let Some(exit_code) = state.exit_code {
                        ContainerStatus::Exited(exit_code)
                    } else {
                        ContainerStatus::Stopped
                    }
                } else {
                    ContainerStatus::Unknown("No state information".to_owned())
                }
            }
            Err(_) => ContainerStatus::NotFound,
        };
        Ok(status)
    }

    pub async fn is_running(&self, name: &str) -> bool {
        matches!(
            self.get_container_status(name).await,
            Ok(ContainerStatus::Running)
        )
    }

    /// Run a command inside a container, collecting stdout+stderr and the
    /// exit code of the exec'd process.
    pub async fn exec_command(&self, container: &str, cmd: Vec<&str>) -> Result<ExecOutput> {
        debug!(container, ?cmd, "exec");
        let exec_options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd),
            ..Default::default()
        };

        let exec = self.docker.create_exec(container, exec_options).await?;

        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(Ok(msg)) = output.next().await {
                collected.push_str(&msg.to_string());
            }
        } else {
            return Err(DockerError::ExecError(
                container.to_owned(),
                "failed to attach to exec".to_owned(),
            ));
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutput {
            output: collected,
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput {
            output: String::new(),
            exit_code: 0,
        };
        let bad = ExecOutput {
            output: String::new(),
            exit_code: 2,
        };
        assert!(ok.success());
        assert!(!bad.success());
    }
}
