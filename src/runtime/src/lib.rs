//! ImageFS Runtime - container runtime access.
//!
//! Provides the gateway the volume driver uses to create, inspect, commit
//! and remove backing containers, plus image reference parsing, progress
//! stream draining and helper binary staging.

pub mod docker;
pub mod gateway;
pub mod platform;
pub mod reference;
pub mod staging;
pub mod stream;

// Re-export common types
pub use docker::DockerGateway;
pub use gateway::{
    ContainerDetails, ContainerEntry, ContainerFilter, ContainerSpec, RuntimeGateway,
    SnapshotDescriptor,
};
pub use platform::Platform;
pub use reference::ImageReference;
pub use staging::StagedHelper;
pub use stream::drain_stream;

/// ImageFS Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
