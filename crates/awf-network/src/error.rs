use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("No available private subnet found for the sandbox network")]
    NoAvailableSubnets,

    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Subnet {0} cannot address host octet {1}")]
    UnaddressableHost(String, u8),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
