//! Volume registry view.
//!
//! Volumes are not stored anywhere by the plugin. This view answers "which
//! containers are imagefs volumes" by asking the runtime each time.

use std::sync::Arc;

use imagefs_core::error::{ImagefsError, Result};
use imagefs_core::volume::{LABEL_TARGET, LABEL_VERSION};
use imagefs_runtime::{ContainerEntry, ContainerFilter, RuntimeGateway};

/// Point-in-time queries over driver-owned containers.
#[derive(Clone)]
pub struct VolumeRegistry {
    gateway: Arc<dyn RuntimeGateway>,
}

impl VolumeRegistry {
    pub fn new(gateway: Arc<dyn RuntimeGateway>) -> Self {
        Self { gateway }
    }

    /// All driver-owned containers.
    pub async fn list(&self) -> Result<Vec<ContainerEntry>> {
        self.gateway
            .list_containers(&ContainerFilter::with_label(LABEL_VERSION))
            .await
    }

    /// The unique backing container of `name`.
    pub async fn lookup(&self, name: &str) -> Result<ContainerEntry> {
        let filter = ContainerFilter::with_label(LABEL_VERSION).name(name);
        let mut matches = self.gateway.list_containers(&filter).await?;
        match matches.len() {
            0 => Err(ImagefsError::NotFound(name.to_string())),
            1 => Ok(matches.remove(0)),
            count => {
                tracing::error!(volume = %name, count, "Multiple backing containers for volume");
                Err(ImagefsError::Corrupted {
                    name: name.to_string(),
                    count,
                })
            }
        }
    }

    /// Driver-owned containers whose target label equals `target`.
    pub async fn with_target(&self, target: &str) -> Result<Vec<ContainerEntry>> {
        let filter = ContainerFilter::with_label(LABEL_VERSION).label_value(LABEL_TARGET, target);
        self.gateway.list_containers(&filter).await
    }
}
