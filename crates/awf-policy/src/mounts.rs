//! Mount and credential planning for the agent filesystem view

use crate::error::{PolicyError, Result};
use crate::policy::PolicySet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the read-only host view is rooted inside the agent container.
pub const HOST_VIEW_ROOT: &str = "/host";

/// Effective user the agent command runs as.
pub const AGENT_USER: &str = "1000:1000";

/// Credential files overlaid with empty content in the default plan,
/// relative to the user's home directory.
const CREDENTIAL_RELATIVE: &[&str] = &[
    ".docker/config.json",
    ".config/gh/hosts.yml",
    ".npmrc",
    ".cargo/credentials.toml",
    ".cargo/credentials",
    ".config/composer/auth.json",
];

/// Telemetry and MCP log locations hidden alongside credentials, relative to
/// the user's home directory.
const TELEMETRY_RELATIVE: &[&str] = &[".copilot/logs", ".config/configstore"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "ro",
            MountMode::ReadWrite => "rw",
        }
    }
}

/// One bind mount from host to agent filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub host: PathBuf,
    pub container: PathBuf,
    pub mode: MountMode,
}

impl BindMount {
    /// Parse a `host:container[:mode]` spec; mode defaults to rw.
    pub fn parse(spec: &str) -> Result<BindMount> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (host, container, mode) = match parts.as_slice() {
            [host, container] => (*host, *container, MountMode::ReadWrite),
            [host, container, "ro"] => (*host, *container, MountMode::ReadOnly),
            [host, container, "rw"] => (*host, *container, MountMode::ReadWrite),
            _ => return Err(PolicyError::InvalidMountSpec(spec.to_string())),
        };

        if !host.starts_with('/') || !container.starts_with('/') {
            return Err(PolicyError::InvalidMountSpec(spec.to_string()));
        }

        Ok(BindMount {
            host: PathBuf::from(host),
            container: PathBuf::from(container),
            mode,
        })
    }

    /// Docker `-v` argument form.
    pub fn to_volume_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.host.display(),
            self.container.display(),
            self.mode.as_str()
        )
    }
}

/// One entry of the mount plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountEntry {
    Bind(BindMount),
    /// The target is replaced by an empty, readable file. Tooling that checks
    /// for existence keeps seeing the file and does not fall back to a less
    /// constrained path.
    Hide(PathBuf),
}

/// Ordered set of bind mounts and hide overlays plus the execution identity
/// the agent container receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountPlan {
    entries: Vec<MountEntry>,
    workdir: PathBuf,
    agent_user: String,
    full_filesystem: bool,
}

impl MountPlan {
    /// Translate policy plus user-supplied mount specs into the concrete plan.
    pub fn build(
        policy: &PolicySet,
        user_mounts: &[String],
        workdir: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<MountPlan> {
        let home = home
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/root"));
        let workdir = resolve_workdir(workdir, &home);

        if policy.enable_full_filesystem_access() {
            warn!(
                "full filesystem access enabled: the agent sees the entire host \
                 read-write and credential hiding is OFF"
            );
            return Ok(MountPlan {
                entries: vec![MountEntry::Bind(BindMount {
                    host: PathBuf::from("/"),
                    container: PathBuf::from(HOST_VIEW_ROOT),
                    mode: MountMode::ReadWrite,
                })],
                workdir,
                agent_user: AGENT_USER.to_string(),
                full_filesystem: true,
            });
        }

        let mut entries = Vec::new();

        if !user_mounts.is_empty() {
            for spec in user_mounts {
                entries.push(MountEntry::Bind(BindMount::parse(spec)?));
            }
            // User mounts disable the blanket host view; only the named paths
            // plus the irreducible set are visible.
            entries.push(MountEntry::Bind(BindMount {
                host: home.join(".copilot"),
                container: home.join(".copilot"),
                mode: MountMode::ReadWrite,
            }));
            entries.push(MountEntry::Bind(BindMount {
                host: PathBuf::from("/etc/resolv.conf"),
                container: PathBuf::from("/etc/resolv.conf"),
                mode: MountMode::ReadOnly,
            }));
            entries.push(MountEntry::Bind(BindMount {
                host: workdir.clone(),
                container: workdir.clone(),
                mode: MountMode::ReadWrite,
            }));
            debug!(mounts = entries.len(), "selective mount plan");
            return Ok(MountPlan {
                entries,
                workdir,
                agent_user: AGENT_USER.to_string(),
                full_filesystem: false,
            });
        }

        // Default plan: read-only host view with credentials overlaid empty.
        entries.push(MountEntry::Bind(BindMount {
            host: PathBuf::from("/"),
            container: PathBuf::from(HOST_VIEW_ROOT),
            mode: MountMode::ReadOnly,
        }));
        for hidden in hidden_paths(&home) {
            // Chroot layout: hide at the natural path and the /host prefix.
            entries.push(MountEntry::Hide(
                Path::new(HOST_VIEW_ROOT).join(hidden.strip_prefix("/").unwrap_or(&hidden)),
            ));
            entries.push(MountEntry::Hide(hidden));
        }
        entries.push(MountEntry::Bind(BindMount {
            host: PathBuf::from("/etc/resolv.conf"),
            container: PathBuf::from("/etc/resolv.conf"),
            mode: MountMode::ReadOnly,
        }));
        entries.push(MountEntry::Bind(BindMount {
            host: workdir.clone(),
            container: workdir.clone(),
            mode: MountMode::ReadWrite,
        }));

        Ok(MountPlan {
            entries,
            workdir,
            agent_user: AGENT_USER.to_string(),
            full_filesystem: false,
        })
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn agent_user(&self) -> &str {
        &self.agent_user
    }

    pub fn full_filesystem(&self) -> bool {
        self.full_filesystem
    }

    /// Capabilities dropped from the agent container. The agent receives
    /// none; NET_ADMIN and NET_RAW are called out by the rule installer as
    /// the ones that would void the firewall.
    pub fn capability_drops(&self) -> &'static [&'static str] {
        &["ALL"]
    }

    /// Paths hidden by this plan.
    pub fn hidden(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| match e {
            MountEntry::Hide(p) => Some(p.as_path()),
            MountEntry::Bind(_) => None,
        })
    }

    /// Bind mounts of this plan.
    pub fn binds(&self) -> impl Iterator<Item = &BindMount> {
        self.entries.iter().filter_map(|e| match e {
            MountEntry::Bind(b) => Some(b),
            MountEntry::Hide(_) => None,
        })
    }
}

fn resolve_workdir(requested: Option<PathBuf>, home: &Path) -> PathBuf {
    match requested {
        Some(dir) if dir.exists() => dir,
        Some(dir) => {
            warn!(
                workdir = %dir.display(),
                "requested working directory does not exist, falling back to home"
            );
            home.to_path_buf()
        }
        None => std::env::current_dir().unwrap_or_else(|_| home.to_path_buf()),
    }
}

fn hidden_paths(home: &Path) -> Vec<PathBuf> {
    CREDENTIAL_RELATIVE
        .iter()
        .chain(TELEMETRY_RELATIVE.iter())
        .map(|rel| home.join(rel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyOptions, PolicySet};

    fn policy(full_fs: bool) -> PolicySet {
        PolicySet::build(
            &[],
            PolicyOptions {
                enable_full_filesystem_access: full_fs,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_mount_spec_parsing() {
        let m = BindMount::parse("/src:/dst").unwrap();
        assert_eq!(m.mode, MountMode::ReadWrite);
        let m = BindMount::parse("/src:/dst:ro").unwrap();
        assert_eq!(m.mode, MountMode::ReadOnly);
        assert_eq!(m.to_volume_arg(), "/src:/dst:ro");

        assert!(BindMount::parse("/src").is_err());
        assert!(BindMount::parse("/src:/dst:rx").is_err());
        assert!(BindMount::parse("relative:/dst").is_err());
    }

    #[test]
    fn test_full_filesystem_plan_is_single_rw_root() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = MountPlan::build(
            &policy(true),
            &[],
            Some(tmp.path().to_path_buf()),
            Some(PathBuf::from("/home/user")),
        )
        .unwrap();
        assert!(plan.full_filesystem());
        assert_eq!(plan.entries().len(), 1);
        assert_eq!(plan.hidden().count(), 0);
    }

    #[test]
    fn test_default_plan_hides_credentials_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let home = PathBuf::from("/home/user");
        let plan = MountPlan::build(
            &policy(false),
            &[],
            Some(tmp.path().to_path_buf()),
            Some(home.clone()),
        )
        .unwrap();
        assert!(!plan.full_filesystem());

        let hidden: Vec<_> = plan.hidden().collect();
        let natural = home.join(".docker/config.json");
        let chrooted = Path::new("/host").join("home/user/.docker/config.json");
        assert!(hidden.contains(&natural.as_path()));
        assert!(hidden.contains(&chrooted.as_path()));

        // Blanket ro host view present.
        assert!(plan.binds().any(|b| {
            b.host == Path::new("/")
                && b.container == Path::new("/host")
                && b.mode == MountMode::ReadOnly
        }));
    }

    #[test]
    fn test_user_mounts_disable_blanket_host_view() {
        let tmp = tempfile::tempdir().unwrap();
        let plan = MountPlan::build(
            &policy(false),
            &["/data:/data:ro".to_string()],
            Some(tmp.path().to_path_buf()),
            Some(PathBuf::from("/home/user")),
        )
        .unwrap();

        assert!(!plan.binds().any(|b| b.host == Path::new("/")));
        assert_eq!(plan.hidden().count(), 0);
        assert!(plan.binds().any(|b| b.host == Path::new("/data")));
        assert!(plan
            .binds()
            .any(|b| b.host == Path::new("/etc/resolv.conf") && b.mode == MountMode::ReadOnly));
    }

    #[test]
    fn test_missing_workdir_falls_back_to_home() {
        let home = tempfile::tempdir().unwrap();
        let plan = MountPlan::build(
            &policy(false),
            &[],
            Some(PathBuf::from("/definitely/not/here")),
            Some(home.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(plan.workdir(), home.path());
    }
}
