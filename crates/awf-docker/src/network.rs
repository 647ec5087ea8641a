use bollard::models::{Ipam, IpamConfig};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{DockerError, Result};

#[derive(Clone)]
pub struct NetworkManager {
    docker: Docker,
}

impl NetworkManager {
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Subnets already claimed by existing Docker networks.
    pub async fn used_subnets(&self) -> Result<HashSet<String>> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await?;

        let mut used = HashSet::new();
        for network in networks {
            if let Some(ipam) = network.ipam {
                for config in ipam.config.unwrap_or_default() {
                    if let Some(subnet) = config.subnet {
                        used.insert(subnet);
                    }
                }
            }
        }
        Ok(used)
    }

    /// Create the private bridge network with the given subnet and gateway if
    /// it does not already exist. An existing network with a different subnet
    /// is an error: reusing it would break the static addressing plan.
    pub async fn ensure_network(&self, name: &str, subnet: &str, gateway: &str) -> Result<()> {
        if let Ok(existing) = self.docker.inspect_network::<String>(name, None).await {
            let subnets: Vec<String> = existing
                .ipam
                .and_then(|ipam| ipam.config)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| c.subnet)
                .collect();
            if subnets.iter().any(|s| s == subnet) {
                debug!(network = name, subnet, "reusing existing sandbox network");
                return Ok(());
            }
            return Err(DockerError::NetworkError(format!(
                "network {} exists with subnet {:?}, expected {}",
                name, subnets, subnet
            )));
        }

        let options = CreateNetworkOptions {
            name: name.to_string(),
            driver: "bridge".to_string(),
            ipam: Ipam {
                config: Some(vec![IpamConfig {
                    subnet: Some(subnet.to_string()),
                    gateway: Some(gateway.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            options: HashMap::new(),
            ..Default::default()
        };

        self.docker.create_network(options).await?;
        info!(network = name, subnet, "created sandbox network");
        Ok(())
    }

    pub async fn remove_network(&self, name: &str) -> Result<()> {
        self.docker.remove_network(name).await?;
        Ok(())
    }
}
