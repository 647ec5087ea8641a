//! # Sandbox network planning
//!
//! Private-subnet selection with conflict checking against existing Docker
//! networks, and the deterministic compiler from a policy to the
//! packet-filter script the init container runs.

pub mod error;
pub mod rules;
pub mod subnet;

pub use error::{NetworkError, Result};
pub use rules::PacketFilterRules;
pub use subnet::SandboxSubnet;
