//! Volume metadata schema.
//!
//! A volume has no record of its own: it is a backing container carrying
//! the marker label below. Everything the driver needs to know later
//! (ownership, publish target) is read back from those labels.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version stamped on every backing container this driver creates.
pub const VERSION_MARKER: &str = "0.2";

/// Marker label; its presence makes a container driver-owned.
pub const LABEL_VERSION: &str = "com.docker.imagefs.version";

/// Optional image reference the volume is committed to on removal.
pub const LABEL_TARGET: &str = "com.docker.imagefs.target";

/// Volume scope reported by `Capabilities`.
pub const SCOPE_LOCAL: &str = "local";

/// Labels carried by a backing container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeLabels {
    /// Marker value; `None` for containers this driver does not own
    pub version: Option<String>,
    /// Commit/publish target
    pub target: Option<String>,
}

impl VolumeLabels {
    /// Labels for a freshly created volume.
    pub fn new(target: Option<&str>) -> Self {
        Self {
            version: Some(VERSION_MARKER.to_string()),
            target: target.map(str::to_string),
        }
    }

    /// Read the schema out of a container's label map.
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        Self {
            version: labels.get(LABEL_VERSION).cloned(),
            target: labels.get(LABEL_TARGET).cloned(),
        }
    }

    /// Render as a runtime label map.
    pub fn to_labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        if let Some(ref version) = self.version {
            labels.insert(LABEL_VERSION.to_string(), version.clone());
        }
        if let Some(ref target) = self.target {
            labels.insert(LABEL_TARGET.to_string(), target.clone());
        }
        labels
    }

    pub fn is_driver_owned(&self) -> bool {
        self.version.is_some()
    }
}

/// Options accepted by `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    pub source: String,
    pub target: Option<String>,
    pub platform: Option<String>,
}

impl CreateOptions {
    pub const SOURCE: &'static str = "source";
    pub const TARGET: &'static str = "target";
    pub const PLATFORM: &'static str = "platform";

    /// Extract options from a request's option map.
    ///
    /// Returns `None` when `source` is absent or blank.
    pub fn from_opts(opts: &HashMap<String, String>) -> Option<Self> {
        let source = opts
            .get(Self::SOURCE)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())?;
        Some(Self {
            source: source.to_string(),
            target: non_empty(opts.get(Self::TARGET)),
            platform: non_empty(opts.get(Self::PLATFORM)),
        })
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A resolved volume as reported by `get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: String,
}

/// Re-root a host-absolute merged directory so it resolves from a process
/// whose root filesystem sits `depth` levels below the host root.
pub fn host_relative_mountpoint(merged_dir: &str, depth: usize) -> String {
    let mut path = "../".repeat(depth);
    path.push_str(merged_dir.trim_start_matches('/'));
    path
}
