//! Volume lifecycle driver.
//!
//! Maps the volume plugin verbs onto runtime operations:
//! - Volume → one backing container, named after the volume
//! - Volume content → the container's overlay merged directory
//! - Remove → stop, optional commit and publish, delete
//!
//! The runtime is the only record of volumes; the driver keeps no state
//! between calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use imagefs_core::config::DriverConfig;
use imagefs_core::error::{ImagefsError, Result};
use imagefs_core::volume::{
    host_relative_mountpoint, CreateOptions, VolumeInfo, VolumeLabels, SCOPE_LOCAL,
};
use imagefs_runtime::{ContainerSpec, ImageReference, Platform, RuntimeGateway, StagedHelper};

use crate::registry::VolumeRegistry;

/// Tunables of the lifecycle driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// `../` steps prepended to merged directories
    pub mount_prefix_depth: usize,
    /// Grace period when stopping a backing container
    pub stop_grace: Duration,
}

impl From<&DriverConfig> for DriverSettings {
    fn from(config: &DriverConfig) -> Self {
        Self {
            mount_prefix_depth: config.mount_prefix_depth,
            stop_grace: config.stop_grace(),
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from(&DriverConfig::default())
    }
}

/// Process-wide collaborators, built once at startup.
#[derive(Clone)]
pub struct DriverContext {
    pub gateway: Arc<dyn RuntimeGateway>,
    pub helper: StagedHelper,
}

/// Implements the volume plugin operations on top of a runtime gateway.
pub struct LifecycleDriver {
    gateway: Arc<dyn RuntimeGateway>,
    registry: VolumeRegistry,
    helper: StagedHelper,
    settings: DriverSettings,
}

impl LifecycleDriver {
    pub fn new(context: DriverContext, settings: DriverSettings) -> Self {
        Self {
            registry: VolumeRegistry::new(context.gateway.clone()),
            gateway: context.gateway,
            helper: context.helper,
            settings,
        }
    }

    /// Create a volume: pull the source image and start a backing container.
    ///
    /// A start failure after a successful create leaves a stopped container
    /// behind; a later `remove` cleans it up.
    pub async fn create(&self, name: &str, opts: &HashMap<String, String>) -> Result<()> {
        validate_name(name)?;
        let options = CreateOptions::from_opts(opts).ok_or_else(|| {
            ImagefsError::InvalidArgument("no source image specified".to_string())
        })?;

        let source = ImageReference::parse(&options.source)?;
        // Validate the target now; it is only read back at removal.
        if let Some(ref target) = options.target {
            ImageReference::parse(target)?;
        }
        let platform = match options.platform {
            Some(ref spec) => {
                let platform = Platform::parse(spec)?;
                if self.gateway.supports_platform() {
                    Some(platform)
                } else {
                    tracing::warn!(
                        volume = %name,
                        platform = %platform,
                        "Runtime API too old for platform selection, ignoring"
                    );
                    None
                }
            }
            None => None,
        };

        tracing::info!(volume = %name, source = %source, target = ?options.target, "Creating volume");

        self.gateway.pull_image(&source, platform.as_ref()).await?;

        let spec = ContainerSpec {
            name: name.to_string(),
            image: source,
            entrypoint: self.helper.entrypoint(),
            labels: VolumeLabels::new(options.target.as_deref()).to_labels(),
            binds: vec![self.helper.bind()],
            network_disabled: true,
            platform,
        };
        let id = self.gateway.create_container(&spec).await?;
        tracing::info!(volume = %name, container = %id, "Backing container created");

        self.gateway.start_container(&id).await?;
        Ok(())
    }

    /// Resolve a volume and its mount point.
    pub async fn get(&self, name: &str) -> Result<VolumeInfo> {
        let entry = self.registry.lookup(name).await?;
        let details = self.gateway.inspect_container(&entry.id).await?;

        let snapshot = details
            .snapshot
            .ok_or_else(|| ImagefsError::MissingSnapshotData("GraphDriver".to_string()))?;
        if !snapshot.is_overlay() {
            return Err(ImagefsError::UnsupportedBackend(snapshot.driver));
        }
        let merged_dir = snapshot
            .merged_dir()
            .ok_or_else(|| ImagefsError::MissingSnapshotData("MergedDir".to_string()))?;
        tracing::debug!(volume = %name, merged_dir = %merged_dir, "Resolved merged directory");

        Ok(VolumeInfo {
            name: name.to_string(),
            mountpoint: host_relative_mountpoint(merged_dir, self.settings.mount_prefix_depth),
        })
    }

    /// Mount point of a volume.
    pub async fn path(&self, name: &str) -> Result<String> {
        Ok(self.get(name).await?.mountpoint)
    }

    /// Names of all volumes.
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .registry
            .list()
            .await?
            .iter()
            .map(|entry| entry.display_name().to_string())
            .collect())
    }

    /// Ensure the backing container runs and return the mount point.
    pub async fn mount(&self, name: &str, caller: &str) -> Result<String> {
        tracing::info!(volume = %name, caller = %caller, "Mounting volume");
        let entry = self.registry.lookup(name).await?;
        self.gateway.start_container(&entry.id).await?;
        self.path(name).await
    }

    /// Acknowledge an unmount.
    ///
    /// The container keeps running: other callers may still hold the mount
    /// point, and only `remove` stops it.
    pub async fn unmount(&self, name: &str, caller: &str) -> Result<()> {
        tracing::info!(volume = %name, caller = %caller, "Unmounting volume");
        Ok(())
    }

    /// Tear down a volume, committing and publishing it when it has a target.
    ///
    /// Two concurrent removals of one name both pass the lookup; callers
    /// that need that to be safe must serialise removal per name.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let entry = self.registry.lookup(name).await?;
        tracing::info!(volume = %name, container = %entry.id, "Removing volume");

        self.gateway
            .stop_container(&entry.id, self.settings.stop_grace)
            .await?;

        let details = self.gateway.inspect_container(&entry.id).await?;
        let target = VolumeLabels::from_labels(&details.labels).target;

        if let Some(ref target) = target {
            self.publish(name, &entry.id, target).await?;
        }

        self.gateway.remove_container(&entry.id).await?;
        tracing::info!(volume = %name, "Volume removed");

        if let Some(ref target) = target {
            self.sweep_duplicates(&entry.id, target).await;
        }
        Ok(())
    }

    pub fn capabilities(&self) -> &'static str {
        SCOPE_LOCAL
    }

    async fn publish(&self, name: &str, container: &str, target: &str) -> Result<()> {
        let reference = ImageReference::parse(target)?;
        tracing::info!(volume = %name, target = %reference, "Committing volume");
        self.gateway.commit_container(container, &reference).await?;

        if reference.is_registry_path() {
            tracing::info!(volume = %name, target = %reference, "Publishing volume image");
            self.gateway.push_image(&reference).await?;
        }
        Ok(())
    }

    /// Best-effort removal of other containers sharing `target`.
    async fn sweep_duplicates(&self, removed: &str, target: &str) {
        let leftovers = match self.registry.with_target(target).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Duplicate sweep failed");
                return;
            }
        };
        for entry in leftovers.iter().filter(|e| e.id != removed) {
            tracing::warn!(
                target = %target,
                container = %entry.id,
                "Removing duplicate backing container"
            );
            if let Err(e) = self.gateway.remove_container(&entry.id).await {
                tracing::warn!(container = %entry.id, error = %e, "Duplicate removal failed");
            }
        }
    }
}

/// Container names accepted by the runtime: `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ImagefsError::InvalidArgument(format!(
            "invalid volume name '{}'",
            name
        )))
    }
}
