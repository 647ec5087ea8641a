//! Sandbox orchestration
//!
//! The startup protocol is strictly sequential: the proxy must be listening
//! before the init container points the NAT redirect at it, and the rules
//! must be installed before the agent executes its first instruction. The
//! proxy is never restarted within a run. Teardown runs on every exit path.

use crate::error::{EngineError, Result};
use crate::proxy::ProxyConfig;
use crate::seccomp;
use crate::state::{RunState, StateTracker};
use awf_docker::{ContainerManager, ImagePuller, NetworkManager};
use awf_network::{PacketFilterRules, SandboxSubnet};
use awf_policy::{MountEntry, MountPlan, PolicySet, SecretEnvPolicy};
use awf_types::{
    agent_image, init_image, squid_image, AGENT_CONTAINER, ENV_ONESHOT_LIB, INIT_CONTAINER,
    NETWORK_NAME, ONESHOT_CONTAINER_PATH, PRESERVED_DIR_PREFIX, PROXY_CONTAINER,
};
use bollard::container::{Config, NetworkingConfig};
use bollard::models::{EndpointIpamConfig, EndpointSettings, HostConfig};
use chrono::Utc;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, warn};

const RULES_CONTAINER_PATH: &str = "/awf/rules.sh";
const SQUID_CONF_CONTAINER_PATH: &str = "/etc/squid/squid.conf";
const SQUID_LOG_DIR: &str = "/var/log/squid";

/// Everything one invocation needs, computed before any container starts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub policy: PolicySet,
    pub mounts: MountPlan,
    pub secrets: SecretEnvPolicy,
    /// User command, argv form.
    pub command: Vec<String>,
    /// Explicit environment assignments for the agent.
    pub env: Vec<(String, String)>,
    /// Pass through every caller environment variable.
    pub env_all: bool,
    pub tty: bool,
    /// Preserve all three containers for inspection after the run.
    pub keep_containers: bool,
    /// Preserve the access log to a timestamped directory at teardown.
    pub preserve_logs: bool,
    /// Agent image override; falls back to the configured default.
    pub agent_image: Option<String>,
    /// Sandbox subnet override in CIDR form.
    pub subnet: Option<String>,
    pub proxy_ready_timeout: Duration,
}

impl RunRequest {
    pub fn new(policy: PolicySet, mounts: MountPlan, command: Vec<String>) -> Self {
        Self {
            policy,
            mounts,
            secrets: SecretEnvPolicy::default(),
            command,
            env: Vec::new(),
            env_all: false,
            tty: false,
            keep_containers: false,
            preserve_logs: true,
            agent_image: None,
            subnet: None,
            proxy_ready_timeout: Duration::from_secs(45),
        }
    }
}

/// The run's primary result.
#[derive(Debug)]
pub struct RunOutcome {
    /// The agent's exit code, 0-255 preserved; 130 after an interrupt.
    pub exit_code: i32,
    /// Where the access log was preserved, when it was.
    pub preserved_logs: Option<PathBuf>,
}

/// Per-run artifacts on disk plus the addressing plan.
struct RunContext {
    subnet: SandboxSubnet,
    proxy: ProxyConfig,
    run_dir: PathBuf,
    logs_dir: PathBuf,
    conf_path: PathBuf,
    rules_path: PathBuf,
    seccomp_path: PathBuf,
    empty_path: PathBuf,
}

pub struct Engine {
    containers: ContainerManager,
    networks: NetworkManager,
    puller: ImagePuller,
}

impl Engine {
    pub fn new() -> Result<Self> {
        let containers = ContainerManager::new()?;
        let networks = NetworkManager::from_docker(containers.docker().clone());
        let puller = ImagePuller::from_docker(containers.docker().clone());
        Ok(Self {
            containers,
            networks,
            puller,
        })
    }

    /// Run the user command inside the sandbox. Teardown is guaranteed on
    /// success, failure, and interrupt.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let ctx = self.plan(&request).await?;

        let exec = self.execute(&request, &ctx);
        tokio::pin!(exec);

        let outcome: Result<i32> = tokio::select! {
            result = &mut exec => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for interrupt");
                }
                warn!("interrupt received, cancelling run");
                // Stop the agent first so its attached CLI child exits; the
                // rest of the sandbox comes down in teardown.
                self.containers
                    .stop_container(AGENT_CONTAINER, Some(5))
                    .await
                    .ok();
                Ok(130)
            }
        };

        let preserved = self.teardown(&request, &ctx).await;

        match outcome {
            Ok(exit_code) => {
                info!(exit_code, state = ?RunState::TornDown, "sandbox torn down");
                Ok(RunOutcome {
                    exit_code,
                    preserved_logs: preserved,
                })
            }
            Err(e) => {
                info!(state = ?RunState::TornDownAfterError, "sandbox torn down after error");
                Err(e)
            }
        }
    }

    /// Compute the subnet and write the run's artifacts to disk.
    async fn plan(&self, request: &RunRequest) -> Result<RunContext> {
        let subnet = match &request.subnet {
            Some(cidr) => SandboxSubnet::from_cidr(cidr)?,
            None => {
                let used = self.networks.used_subnets().await?;
                SandboxSubnet::select(&used)?
            }
        };
        info!(
            subnet = %subnet.cidr(),
            proxy = %subnet.proxy_ip(),
            agent = %subnet.agent_ip(),
            "sandbox network plan"
        );

        let proxy = ProxyConfig::new(&request.policy, subnet.proxy_ip());
        let rules =
            PacketFilterRules::compile(&request.policy, subnet.proxy_ip(), proxy.listen_port());

        let run_dir =
            std::env::temp_dir().join(format!("awf-run-{}", Utc::now().timestamp_millis()));
        let logs_dir = run_dir.join("squid-logs");
        let conf_path = run_dir.join("squid.conf");
        let rules_path = run_dir.join("rules.sh");
        let seccomp_path = run_dir.join("seccomp.json");
        let empty_path = run_dir.join("empty");

        let write_artifacts = async {
            tokio::fs::create_dir_all(&logs_dir).await?;
            // The proxy's unprivileged user must be able to write the log.
            tokio::fs::set_permissions(&logs_dir, std::fs::Permissions::from_mode(0o777))
                .await?;
            tokio::fs::write(&conf_path, proxy.config_text()).await?;
            tokio::fs::write(&rules_path, rules.render_script()).await?;
            tokio::fs::write(&seccomp_path, seccomp::render_profile_text()).await?;
            tokio::fs::write(&empty_path, b"").await?;
            tokio::fs::set_permissions(&empty_path, std::fs::Permissions::from_mode(0o444))
                .await?;
            Ok::<(), std::io::Error>(())
        };
        if let Err(e) = write_artifacts.await {
            tokio::fs::remove_dir_all(&run_dir).await.ok();
            return Err(e.into());
        }

        Ok(RunContext {
            subnet,
            proxy,
            run_dir,
            logs_dir,
            conf_path,
            rules_path,
            seccomp_path,
            empty_path,
        })
    }

    /// The strictly ordered startup protocol through agent completion.
    async fn execute(&self, request: &RunRequest, ctx: &RunContext) -> Result<i32> {
        let mut state = StateTracker::new();

        self.remove_stale_containers().await;

        self.networks
            .ensure_network(
                NETWORK_NAME,
                &ctx.subnet.cidr().to_string(),
                &ctx.subnet.gateway_ip().to_string(),
            )
            .await
            .map_err(|e| EngineError::Startup(format!("network creation failed: {}", e)))?;
        state.advance(RunState::NetworkReady);

        let agent_img = request
            .agent_image
            .clone()
            .unwrap_or_else(agent_image);
        for image in [squid_image(), init_image(), agent_img.clone()] {
            if let Err(e) = self.puller.ensure_image(&image).await {
                warn!(image = %image, error = %e, "opportunistic pull failed, container start will retry");
            }
        }

        state.advance(RunState::ProxyStarting);
        self.start_proxy(request, ctx).await?;
        self.probe_proxy_ready(ctx, request.proxy_ready_timeout)
            .await?;
        state.advance(RunState::ProxyReady);

        state.advance(RunState::RulesInstalling);
        self.install_rules(ctx).await?;
        state.advance(RunState::RulesInstalled);

        state.advance(RunState::AgentRunning);
        let exit_code = self.run_agent(request, ctx, &agent_img).await?;
        state.advance(RunState::AgentExited);
        info!(exit_code, "agent exited");
        Ok(exit_code)
    }

    /// Leftovers from an earlier crashed run would collide on names.
    async fn remove_stale_containers(&self) {
        for name in [AGENT_CONTAINER, INIT_CONTAINER, PROXY_CONTAINER] {
            if self.containers.container_exists(name).await {
                warn!(container = name, "removing stale sandbox container");
                self.containers.remove_container(name, true).await.ok();
            }
        }
    }

    async fn start_proxy(&self, request: &RunRequest, ctx: &RunContext) -> Result<()> {
        let binds = vec![
            format!(
                "{}:{}:ro",
                ctx.conf_path.display(),
                SQUID_CONF_CONTAINER_PATH
            ),
            format!("{}:{}", ctx.logs_dir.display(), SQUID_LOG_DIR),
        ];

        let extra_hosts = if request.policy.enable_host_access() {
            Some(vec!["host.docker.internal:host-gateway".to_string()])
        } else {
            None
        };

        let config = Config {
            image: Some(squid_image()),
            host_config: Some(HostConfig {
                binds: Some(binds),
                extra_hosts,
                ..Default::default()
            }),
            networking_config: Some(NetworkingConfig {
                endpoints_config: endpoint(ctx.subnet.proxy_ip().to_string()),
            }),
            ..Default::default()
        };

        self.containers
            .create_container(PROXY_CONTAINER, config)
            .await
            .map_err(|e| EngineError::Startup(format!("proxy create failed: {}", e)))?;
        self.containers
            .start_container(PROXY_CONTAINER)
            .await
            .map_err(|e| EngineError::Startup(format!("proxy start failed: {}", e)))?;
        info!(container = PROXY_CONTAINER, "proxy started");
        Ok(())
    }

    /// Probe the proxy listener until it accepts a TCP connection.
    ///
    /// Progressive probe timeouts with short interstitial delays; only this
    /// step retries, within a bounded budget.
    async fn probe_proxy_ready(&self, ctx: &RunContext, budget: Duration) -> Result<()> {
        let addr = SocketAddr::from((ctx.proxy.listen_ip(), ctx.proxy.listen_port()));
        let deadline = Instant::now() + budget;
        let probe_timeouts = [10u64, 20, 30];
        let delays = [2u64, 4];
        let mut attempt = 0usize;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::Startup(format!(
                    "proxy did not become ready within {:?}",
                    budget
                )));
            }

            let probe_timeout =
                Duration::from_secs(probe_timeouts[attempt.min(probe_timeouts.len() - 1)])
                    .min(remaining);
            match tokio::time::timeout(probe_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => {
                    debug!(%addr, attempt, "proxy listener ready");
                    return Ok(());
                }
                Ok(Err(e)) => debug!(%addr, attempt, error = %e, "proxy probe refused"),
                Err(_) => debug!(%addr, attempt, "proxy probe timed out"),
            }

            let delay = Duration::from_secs(delays[attempt.min(delays.len() - 1)]);
            if Instant::now() + delay >= deadline {
                return Err(EngineError::Startup(format!(
                    "proxy did not become ready within {:?}",
                    budget
                )));
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Start the namespace holder and run the packet-filter script inside
    /// it. The script's exit status gates the agent; the holder keeps the
    /// namespace alive until teardown.
    async fn install_rules(&self, ctx: &RunContext) -> Result<()> {
        let config = Config {
            image: Some(init_image()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(HostConfig {
                cap_add: Some(vec!["NET_ADMIN".to_string()]),
                binds: Some(vec![format!(
                    "{}:{}:ro",
                    ctx.rules_path.display(),
                    RULES_CONTAINER_PATH
                )]),
                ..Default::default()
            }),
            networking_config: Some(NetworkingConfig {
                endpoints_config: endpoint(ctx.subnet.agent_ip().to_string()),
            }),
            ..Default::default()
        };

        self.containers
            .create_container(INIT_CONTAINER, config)
            .await
            .map_err(|e| EngineError::Startup(format!("init create failed: {}", e)))?;
        self.containers
            .start_container(INIT_CONTAINER)
            .await
            .map_err(|e| EngineError::Startup(format!("init start failed: {}", e)))?;

        let exec = self
            .containers
            .exec_command(INIT_CONTAINER, vec!["sh", RULES_CONTAINER_PATH])
            .await
            .map_err(|e| EngineError::Startup(format!("rule install exec failed: {}", e)))?;
        if !exec.success() {
            return Err(EngineError::Startup(format!(
                "packet-filter install exited {}: {}",
                exec.exit_code,
                exec.output.trim()
            )));
        }
        info!("packet-filter rules installed");
        Ok(())
    }

    /// Launch the agent through the Docker CLI so stdio, the TTY, and the
    /// exit code propagate natively.
    async fn run_agent(
        &self,
        request: &RunRequest,
        ctx: &RunContext,
        image: &str,
    ) -> Result<i32> {
        let args = agent_run_args(request, ctx, image);
        debug!(args = %args.join(" "), "launching agent");

        let mut cmd = Command::new("docker");
        cmd.args(&args);
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Runtime(format!("failed to spawn docker run: {}", e)))?;
        let status = child.wait().await?;
        Ok(exit_code_from_status(status))
    }

    /// Best-effort teardown: agent first, then proxy, then the namespace
    /// holder, then the network. Failures are logged at warn and never
    /// override the run's primary result.
    async fn teardown(&self, request: &RunRequest, ctx: &RunContext) -> Option<PathBuf> {
        if request.keep_containers {
            info!("keeping sandbox containers for inspection");
        } else {
            for name in [AGENT_CONTAINER, PROXY_CONTAINER, INIT_CONTAINER] {
                if !self.containers.container_exists(name).await {
                    continue;
                }
                if let Err(e) = self.containers.stop_container(name, Some(5)).await {
                    warn!(container = name, error = %e, "failed to stop container");
                }
                if let Err(e) = self.containers.remove_container(name, true).await {
                    warn!(container = name, error = %e, "failed to remove container");
                }
            }
            if let Err(e) = self.networks.remove_network(NETWORK_NAME).await {
                warn!(network = NETWORK_NAME, error = %e, "failed to remove network");
            }
        }

        let preserved = if request.preserve_logs && ctx.logs_dir.join("access.log").is_file() {
            let target = std::env::temp_dir().join(format!(
                "{}{}",
                PRESERVED_DIR_PREFIX,
                Utc::now().timestamp_millis()
            ));
            match std::fs::rename(&ctx.logs_dir, &target) {
                Ok(()) => {
                    info!(path = %target.display(), "access log preserved");
                    Some(target)
                }
                Err(e) => {
                    warn!(error = %e, "failed to preserve access log");
                    None
                }
            }
        } else {
            None
        };

        if let Err(e) = std::fs::remove_dir_all(&ctx.run_dir) {
            warn!(error = %e, "failed to clean up run directory");
        }

        preserved
    }
}

fn endpoint(ip: String) -> HashMap<String, EndpointSettings> {
    let mut endpoints = HashMap::new();
    endpoints.insert(
        NETWORK_NAME.to_string(),
        EndpointSettings {
            ipam_config: Some(EndpointIpamConfig {
                ipv4_address: Some(ip),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    endpoints
}

fn exit_code_from_status(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        // Killed by a signal: report the conventional 128+N.
        None => 128 + status.signal().unwrap_or(0),
    }
}

/// Assemble the `docker run` argument vector for the agent container.
fn agent_run_args(request: &RunRequest, ctx: &RunContext, image: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".into(), "--name".into(), AGENT_CONTAINER.into()];
    if !request.keep_containers {
        args.push("--rm".into());
    }

    // The agent joins the init holder's network namespace, where the rules
    // are already installed, and keeps no capability to undo them.
    args.push("--network".into());
    args.push(format!("container:{}", INIT_CONTAINER));
    for cap in request.mounts.capability_drops() {
        args.push("--cap-drop".into());
        args.push((*cap).into());
    }
    args.push("--security-opt".into());
    args.push("no-new-privileges".into());
    args.push("--security-opt".into());
    args.push(format!("seccomp={}", ctx.seccomp_path.display()));

    args.push("--user".into());
    args.push(request.mounts.agent_user().into());
    args.push("--workdir".into());
    args.push(request.mounts.workdir().display().to_string());

    args.push("--interactive".into());
    if request.tty {
        args.push("--tty".into());
    }

    for entry in request.mounts.entries() {
        args.push("-v".into());
        match entry {
            MountEntry::Bind(bind) => args.push(bind.to_volume_arg()),
            MountEntry::Hide(path) => args.push(format!(
                "{}:{}:ro",
                ctx.empty_path.display(),
                path.display()
            )),
        }
    }

    // Caller environment first so the sandbox's own variables win on clash.
    if request.env_all {
        for (key, _) in std::env::vars() {
            args.push("-e".into());
            // Value-less form: docker inherits the value from this process.
            args.push(key);
        }
    }
    for (key, value) in &request.env {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }

    let proxy_url = ctx.proxy.proxy_url();
    for key in ["HTTP_PROXY", "HTTPS_PROXY", "http_proxy", "https_proxy"] {
        args.push("-e".into());
        args.push(format!("{}={}", key, proxy_url));
    }
    args.push("-e".into());
    args.push("NO_PROXY=localhost,127.0.0.1".into());

    for (key, value) in request.secrets.shim_environment() {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }
    if let Ok(lib) = std::env::var(ENV_ONESHOT_LIB) {
        if Path::new(&lib).is_file() {
            args.push("-v".into());
            args.push(format!("{}:{}:ro", lib, ONESHOT_CONTAINER_PATH));
            args.push("-e".into());
            args.push(format!("LD_PRELOAD={}", ONESHOT_CONTAINER_PATH));
        }
    }

    args.push(image.to_string());
    args.extend(request.command.iter().cloned());
    args
}
