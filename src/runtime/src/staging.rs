//! Helper binary staging.
//!
//! Backing containers run a placeholder process instead of the image's own
//! entrypoint. The executable lives on the host in a directory that is bound
//! into every backing container.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use imagefs_core::config::DriverConfig;
use imagefs_core::error::{ImagefsError, Result};

/// A helper binary ready to be bound into backing containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedHelper {
    /// Host directory holding the helper
    pub host_dir: PathBuf,
    /// Where `host_dir` appears inside a backing container
    pub container_dir: String,
    /// File name of the helper
    pub file_name: String,
}

impl StagedHelper {
    /// Describe an already staged helper without touching the filesystem.
    pub fn new(host_dir: impl Into<PathBuf>, container_dir: &str, file_name: &str) -> Self {
        Self {
            host_dir: host_dir.into(),
            container_dir: container_dir.trim_end_matches('/').to_string(),
            file_name: file_name.to_string(),
        }
    }

    /// Copy `config.helper_source` into `config.runtime_dir`.
    pub fn stage(config: &DriverConfig) -> Result<Self> {
        let helper = Self::new(
            &config.runtime_dir,
            &config.container_runtime_dir,
            &config.helper_name,
        );
        helper.install(&config.helper_source)?;
        Ok(helper)
    }

    pub fn host_path(&self) -> PathBuf {
        self.host_dir.join(&self.file_name)
    }

    /// Entrypoint of a backing container.
    pub fn entrypoint(&self) -> Vec<String> {
        vec![format!("{}/{}", self.container_dir, self.file_name)]
    }

    /// Writable bind of the helper directory.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host_dir.display(), self.container_dir)
    }

    fn install(&self, source: &Path) -> Result<()> {
        if !source.is_file() {
            return Err(ImagefsError::Config(format!(
                "helper binary not found at {}",
                source.display()
            )));
        }

        fs::create_dir_all(&self.host_dir).map_err(|e| {
            ImagefsError::Config(format!(
                "failed to create {}: {}",
                self.host_dir.display(),
                e
            ))
        })?;

        let dest = self.host_path();
        if dest.exists() && is_up_to_date(source, &dest)? {
            tracing::debug!(dest = %dest.display(), "Helper binary is up to date");
            return Ok(());
        }

        tracing::info!(
            src = %source.display(),
            dest = %dest.display(),
            "Staging helper binary"
        );

        fs::copy(source, &dest)?;

        let mut perms = fs::metadata(&dest)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&dest, perms)?;

        Ok(())
    }
}

fn is_up_to_date(source: &Path, dest: &Path) -> Result<bool> {
    let src_meta = fs::metadata(source)?;
    let dst_meta = fs::metadata(dest)?;
    if src_meta.len() != dst_meta.len() {
        return Ok(false);
    }
    match (src_meta.modified(), dst_meta.modified()) {
        (Ok(src_mtime), Ok(dst_mtime)) => Ok(src_mtime <= dst_mtime),
        _ => Ok(false),
    }
}
