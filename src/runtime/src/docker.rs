//! Docker Engine implementation of the runtime gateway.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerConfig, ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CommitContainerOptionsBuilder, CreateContainerOptionsBuilder, CreateImageOptionsBuilder,
    InspectContainerOptions, ListContainersOptionsBuilder, PushImageOptionsBuilder,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
};
use bollard::{Docker, API_DEFAULT_VERSION};

use imagefs_core::config::{DriverConfig, RegistryAuthConfig};
use imagefs_core::error::{ImagefsError, Result};

use crate::gateway::{
    ContainerDetails, ContainerEntry, ContainerFilter, ContainerSpec, RuntimeGateway,
    SnapshotDescriptor,
};
use crate::platform::{api_supports_platform, Platform};
use crate::reference::ImageReference;
use crate::stream::drain_stream;

/// HTTP status the engine answers when a start/stop is already in effect.
const NOT_MODIFIED: u16 = 304;

/// Runtime gateway backed by a Docker-compatible engine API.
pub struct DockerGateway {
    docker: Docker,
    credentials: Option<DockerCredentials>,
    stream_timeout: Duration,
}

impl DockerGateway {
    /// Connect to the engine and negotiate the API version.
    pub async fn connect(config: &DriverConfig) -> Result<Self> {
        let timeout = config.stream_timeout_secs;
        let docker = match config.docker_host.as_deref() {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, timeout, API_DEFAULT_VERSION)
            }
            Some(host) => Docker::connect_with_http(host, timeout, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| runtime_error("connect", e))?;

        let docker = docker
            .negotiate_version()
            .await
            .map_err(|e| runtime_error("negotiate_version", e))?;

        let version = docker.client_version();
        tracing::info!(
            api_version = %format!("{}.{}", version.major_version, version.minor_version),
            "Connected to container runtime"
        );

        Ok(Self {
            docker,
            credentials: config.registry_auth.as_ref().map(credentials_from),
            stream_timeout: config.stream_timeout(),
        })
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        Ok(self.inspect_container(id).await?.running)
    }
}

#[async_trait]
impl RuntimeGateway for DockerGateway {
    fn supports_platform(&self) -> bool {
        let version = self.docker.client_version();
        api_supports_platform(version.major_version, version.minor_version)
    }

    async fn pull_image(&self, image: &ImageReference, platform: Option<&Platform>) -> Result<()> {
        let from_image = image.pull_name();
        let mut options = CreateImageOptionsBuilder::new().from_image(&from_image);
        if image.digest.is_none() {
            options = options.tag(image.tag_or_default());
        }
        if let Some(platform) = platform {
            options = options.platform(&platform.to_string());
        }

        let stream = self
            .docker
            .create_image(Some(options.build()), None, self.credentials.clone());
        let events = drain_stream("pull_image", stream, self.stream_timeout).await?;
        tracing::debug!(image = %image, events, "Image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut options = CreateContainerOptionsBuilder::new().name(&spec.name);
        if let Some(ref platform) = spec.platform {
            options = options.platform(&platform.to_string());
        }

        let body = ContainerCreateBody {
            image: Some(spec.image.full_reference()),
            entrypoint: Some(spec.entrypoint.clone()),
            labels: Some(spec.labels.clone()),
            network_disabled: Some(spec.network_disabled),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        let response = self
            .docker
            .create_container(Some(options.build()), body)
            .await
            .map_err(|e| runtime_error("create_container", e))?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        if self.is_running(id).await? {
            return Ok(());
        }
        match self
            .docker
            .start_container(id, None::<StartContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(runtime_error("start_container", e)),
        }
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        let options = StopContainerOptionsBuilder::new()
            .t(grace.as_secs().min(i32::MAX as u64) as i32)
            .build();
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(runtime_error("stop_container", e)),
        }
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| runtime_error("inspect_container", e))?;

        let (image, labels) = match info.config {
            Some(config) => (config.image, config.labels.unwrap_or_default()),
            None => (None, HashMap::new()),
        };

        Ok(ContainerDetails {
            id: info.id.unwrap_or_else(|| id.to_string()),
            name: info
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
            image,
            labels,
            running: info.state.and_then(|s| s.running).unwrap_or(false),
            snapshot: info.graph_driver.map(|driver| SnapshotDescriptor {
                driver: driver.name,
                data: driver.data,
            }),
        })
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerEntry>> {
        let options = ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&engine_filters(filter))
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| runtime_error("list_containers", e))?;

        // The engine's name filter is a pattern match; apply exact semantics.
        Ok(containers
            .into_iter()
            .map(|c| ContainerEntry {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
            })
            .filter(|entry| filter.matches(entry.display_name(), &entry.labels))
            .collect())
    }

    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<()> {
        let options = CommitContainerOptionsBuilder::new()
            .container(id)
            .repo(&reference.name)
            .tag(reference.tag_or_default())
            .pause(true)
            .build();

        self.docker
            .commit_container(options, ContainerConfig::default())
            .await
            .map_err(|e| runtime_error("commit_container", e))?;
        Ok(())
    }

    async fn push_image(&self, reference: &ImageReference) -> Result<()> {
        let options = PushImageOptionsBuilder::new()
            .tag(reference.tag_or_default())
            .build();
        let credentials = self.credentials.clone().unwrap_or_default();

        let stream = self
            .docker
            .push_image(&reference.name, Some(options), Some(credentials));
        let events = drain_stream("push_image", stream, self.stream_timeout).await?;
        tracing::debug!(reference = %reference, events, "Image pushed");
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::new().force(true).build();
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| runtime_error("remove_container", e))
    }
}

fn runtime_error(operation: &str, err: BollardError) -> ImagefsError {
    let message = match err {
        BollardError::DockerResponseServerError { message, .. } => message,
        other => other.to_string(),
    };
    ImagefsError::runtime(operation, message)
}

fn is_not_modified(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError { status_code, .. } if *status_code == NOT_MODIFIED
    )
}

fn credentials_from(auth: &RegistryAuthConfig) -> DockerCredentials {
    DockerCredentials {
        username: auth.username.clone(),
        password: auth.password.clone(),
        serveraddress: auth.server_address.clone(),
        ..DockerCredentials::default()
    }
}

/// Translate a filter into the engine's `filters` query parameter.
fn engine_filters(filter: &ContainerFilter) -> HashMap<String, Vec<String>> {
    let mut filters: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(ref name) = filter.name {
        filters
            .entry("name".to_string())
            .or_default()
            .push(format!("^/{}$", regex::escape(name)));
    }
    let labels = filters.entry("label".to_string()).or_default();
    labels.extend(filter.labels.iter().cloned());
    labels.extend(
        filter
            .label_values
            .iter()
            .map(|(key, value)| format!("{}={}", key, value)),
    );
    filters.retain(|_, values| !values.is_empty());
    filters
}
