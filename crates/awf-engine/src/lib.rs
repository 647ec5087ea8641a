//! # Enforcement engine
//!
//! Orchestrates the sandbox: renders the proxy configuration and seccomp
//! profile, creates the private network, starts the proxy, installs the
//! packet-filter rules through the init container, runs the user command in
//! the capability-stripped agent container, and tears everything down on
//! every exit path.

pub mod error;
pub mod proxy;
pub mod run;
pub mod seccomp;
pub mod state;

pub use error::{EngineError, Result};
pub use proxy::ProxyConfig;
pub use run::{Engine, RunOutcome, RunRequest};
pub use state::RunState;
