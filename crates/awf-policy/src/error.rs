use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid domain entry: {0}")]
    InvalidDomain(String),

    #[error("Unsupported wildcard position in: {0} (only leading *. is supported)")]
    InvalidWildcard(String),

    #[error("Invalid DNS server address: {0}")]
    InvalidDnsServer(String),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("Invalid mount spec: {0} (expected host:container[:ro|rw])")]
    InvalidMountSpec(String),

    #[error(transparent)]
    Common(#[from] awf_types::CommonError),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
