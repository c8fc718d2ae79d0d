//! Runtime gateway abstraction.
//!
//! The lifecycle driver only talks to the container runtime through this
//! trait. Every call either completes or fails with
//! [`ImagefsError::RuntimeFailure`](imagefs_core::ImagefsError) carrying the
//! runtime's message; no call retries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use imagefs_core::error::Result;

use crate::platform::Platform;
use crate::reference::ImageReference;

/// Graph drivers whose snapshots expose a merged directory.
pub const OVERLAY_DRIVERS: &[&str] = &["overlay", "overlay2"];

/// Key of the merged directory in an overlay snapshot descriptor.
pub const MERGED_DIR_KEY: &str = "MergedDir";

/// Everything needed to instantiate a backing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name (the volume name)
    pub name: String,
    /// Source image
    pub image: ImageReference,
    /// Replacement entrypoint
    pub entrypoint: Vec<String>,
    pub labels: HashMap<String, String>,
    /// Bind mounts in `host:container[:mode]` form
    pub binds: Vec<String>,
    pub network_disabled: bool,
    pub platform: Option<Platform>,
}

/// Filesystem snapshot descriptor reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    /// Graph driver name (e.g. "overlay2")
    pub driver: String,
    pub data: HashMap<String, String>,
}

impl SnapshotDescriptor {
    pub fn is_overlay(&self) -> bool {
        OVERLAY_DRIVERS.contains(&self.driver.as_str())
    }

    pub fn merged_dir(&self) -> Option<&str> {
        self.data
            .get(MERGED_DIR_KEY)
            .map(String::as_str)
            .filter(|dir| !dir.is_empty())
    }
}

/// Result of inspecting a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    /// Name without the runtime's leading `/`
    pub name: String,
    /// Image the container was created from
    pub image: Option<String>,
    pub labels: HashMap<String, String>,
    pub running: bool,
    pub snapshot: Option<SnapshotDescriptor>,
}

/// Listing filter. All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Exact container name
    pub name: Option<String>,
    /// Label keys that must be present
    pub labels: Vec<String>,
    /// Label key/value pairs that must match
    pub label_values: Vec<(String, String)>,
}

impl ContainerFilter {
    pub fn with_label(label: &str) -> Self {
        Self {
            labels: vec![label.to_string()],
            ..Default::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn label_value(mut self, key: &str, value: &str) -> Self {
        self.label_values.push((key.to_string(), value.to_string()));
        self
    }

    /// Whether a container with the given name and labels passes the filter.
    pub fn matches(&self, name: &str, labels: &HashMap<String, String>) -> bool {
        if let Some(ref wanted) = self.name {
            if wanted != name {
                return false;
            }
        }
        self.labels.iter().all(|key| labels.contains_key(key))
            && self
                .label_values
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEntry {
    pub id: String,
    /// Names as reported by the runtime (usually with a leading `/`)
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ContainerEntry {
    /// Primary name without the leading `/`, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/'))
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Synchronous (from the caller's view) container runtime operations.
#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// Whether the negotiated API accepts a platform on pull and create.
    fn supports_platform(&self) -> bool;

    /// Pull an image, consuming the whole progress stream.
    async fn pull_image(&self, image: &ImageReference, platform: Option<&Platform>) -> Result<()>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a container. Starting a running container succeeds.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a container, killing it after `grace`.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerEntry>>;

    /// Commit the container's filesystem as a new image under `reference`.
    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<()>;

    /// Push an image, consuming the whole status stream.
    async fn push_image(&self, reference: &ImageReference) -> Result<()>;

    /// Remove a container regardless of its running state.
    async fn remove_container(&self, id: &str) -> Result<()>;
}
