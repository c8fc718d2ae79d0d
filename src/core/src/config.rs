//! Driver configuration.
//!
//! Values come from an optional YAML file; command-line flags in the plugin
//! binary override individual fields afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ImagefsError, Result};

/// Plugin driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Plugin name; the socket is `<socket_dir>/<plugin_name>.sock`
    pub plugin_name: String,

    /// Directory the plugin socket is created in
    pub socket_dir: PathBuf,

    /// Host directory holding the staged helper binary
    pub runtime_dir: PathBuf,

    /// Executable copied into `runtime_dir` at startup
    pub helper_source: PathBuf,

    /// File name of the staged helper inside `runtime_dir`
    pub helper_name: String,

    /// Mount target of `runtime_dir` inside backing containers
    pub container_runtime_dir: String,

    /// Number of `../` steps prepended to merged directories.
    ///
    /// Must match how deep the plugin's own root sits below the host root.
    pub mount_prefix_depth: usize,

    /// Grace period before a stopped backing container is killed
    pub stop_grace_secs: u64,

    /// Upper bound for draining pull/push progress streams
    pub stream_timeout_secs: u64,

    /// Container runtime endpoint (local defaults when unset)
    pub docker_host: Option<String>,

    /// Registry credentials for pull and push
    pub registry_auth: Option<RegistryAuthConfig>,

    /// Default tracing filter
    pub log_level: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            plugin_name: "imagefs".to_string(),
            socket_dir: PathBuf::from("/run/docker/plugins"),
            runtime_dir: PathBuf::from("/tmp/runtime"),
            helper_source: PathBuf::from("/loop"),
            helper_name: "loop".to_string(),
            container_runtime_dir: "/runtime".to_string(),
            mount_prefix_depth: 11,
            stop_grace_secs: 5,
            stream_timeout_secs: 600,
            docker_host: None,
            registry_auth: None,
            log_level: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// Load configuration from a YAML file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ImagefsError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: DriverConfig = serde_yaml::from_str(&data)?;
        tracing::debug!(path = %path.display(), "Loaded driver configuration");
        Ok(config)
    }

    /// Reject values that would make the driver misbehave silently.
    pub fn validate(&self) -> Result<()> {
        if self.plugin_name.trim().is_empty() {
            return Err(ImagefsError::Config("plugin_name must not be empty".to_string()));
        }
        if self.helper_name.trim().is_empty() || self.helper_name.contains('/') {
            return Err(ImagefsError::Config(format!(
                "invalid helper_name '{}'",
                self.helper_name
            )));
        }
        if !self.container_runtime_dir.starts_with('/') {
            return Err(ImagefsError::Config(format!(
                "container_runtime_dir must be absolute, got '{}'",
                self.container_runtime_dir
            )));
        }
        if self.mount_prefix_depth == 0 {
            return Err(ImagefsError::Config(
                "mount_prefix_depth must be at least 1".to_string(),
            ));
        }
        if self.stream_timeout_secs == 0 {
            return Err(ImagefsError::Config(
                "stream_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the plugin socket.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", self.plugin_name))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

/// Registry credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryAuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub server_address: Option<String>,
}
