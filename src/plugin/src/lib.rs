//! ImageFS Plugin - Docker volume plugin backed by image snapshots.
//!
//! Maps volume plugin concepts to container runtime primitives:
//! - Volume → backing container started from the source image
//! - Mount point → the container's overlay merged directory
//! - Remove → commit (and publish) the container as the target image

pub mod driver;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

#[cfg(test)]
mod testing;

pub use driver::{DriverContext, DriverSettings, LifecycleDriver};
pub use registry::VolumeRegistry;
pub use server::{dispatch, PluginServer};
