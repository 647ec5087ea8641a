//! # Domain policy and mount planning
//!
//! This crate turns user-supplied allow-list entries, DNS servers, port
//! ranges, and mount specs into the immutable policy objects the enforcement
//! engine consumes: a [`PolicySet`] of normalized domain patterns and a
//! [`MountPlan`] describing the agent's view of the host filesystem.

pub mod domain;
pub mod error;
pub mod mounts;
pub mod policy;
pub mod ports;
pub mod secrets;

#[cfg(test)]
mod proptest;

pub use domain::{DomainPattern, PatternKind, ProtocolHint};
pub use error::{PolicyError, Result};
pub use mounts::{BindMount, MountEntry, MountMode, MountPlan};
pub use policy::{PolicyOptions, PolicySet};
pub use ports::HostPortRange;
pub use secrets::SecretEnvPolicy;
