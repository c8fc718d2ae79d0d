//! ImageFS Core - Shared Types
//!
//! Error type, driver configuration and the label schema that ties a
//! volume name to its backing container.

pub mod config;
pub mod error;
pub mod volume;

// Re-export commonly used types
pub use config::{DriverConfig, RegistryAuthConfig};
pub use error::{ImagefsError, Result};
pub use volume::{CreateOptions, VolumeInfo, VolumeLabels};

/// ImageFS version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
