use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::{debug, info};

use crate::error::{DockerError, Result};

pub struct ImagePuller {
    docker: Docker,
}

impl ImagePuller {
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    pub async fn image_present(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    /// Pull the image when it is not available locally. Pulls are idempotent
    /// and may run opportunistically before startup begins.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.image_present(image).await {
            debug!(image, "image already present");
            return Ok(());
        }

        info!(image, "pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| DockerError::PullError(image.to_string(), e.to_string()))?;
        }
        Ok(())
    }
}
