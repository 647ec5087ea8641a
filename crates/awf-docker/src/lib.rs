//! # Docker plumbing for the sandbox
//!
//! Thin bollard wrapper covering exactly what the enforcement engine needs:
//! container lifecycle, exec with exit codes, private bridge networks with
//! static IPAM, and opportunistic image pulls.

pub mod container;
pub mod error;
pub mod network;
pub mod pull;

pub use container::{ContainerManager, ContainerStatus, ExecOutput};
pub use error::{DockerError, Result};
pub use network::NetworkManager;
pub use pull::ImagePuller;
