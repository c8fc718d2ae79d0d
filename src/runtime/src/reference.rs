//! Image reference parsing.
//!
//! Splits references like `registry.example.com/ns/repo:v2` into a name and
//! a tag or digest. Unlike a registry client, the name is kept exactly as
//! written: the runtime resolves short names itself, and commits must land
//! under the literal reference the volume was created with.

use imagefs_core::error::{ImagefsError, Result};

/// Tag used when a reference carries neither tag nor digest.
pub const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Name as written, without tag or digest (e.g. "registry.example.com/ns/repo")
    pub name: String,
    /// Tag (e.g. "v2")
    pub tag: Option<String>,
    /// Digest (e.g. "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `img` / `img:base`
    /// - `ns/repo:tag`
    /// - `registry.example.com:5000/ns/repo`
    /// - `registry.example.com/ns/repo@sha256:abc...`
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImagefsError::InvalidArgument(
                "empty image reference".to_string(),
            ));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(ImagefsError::InvalidArgument(format!(
                "image reference '{}' contains whitespace",
                reference
            )));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name_tag, digest)) => {
                if !digest.contains(':') {
                    return Err(ImagefsError::InvalidArgument(format!(
                        "invalid digest in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (name_tag, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag colon can only appear after the last slash; earlier colons
        // belong to a registry port.
        let last_segment_start = name_tag.rfind('/').map(|pos| pos + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(colon) => {
                let split = last_segment_start + colon;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(ImagefsError::InvalidArgument(format!(
                "invalid repository name in reference '{}'",
                reference
            )));
        }
        if matches!(tag.as_deref(), Some("")) {
            return Err(ImagefsError::InvalidArgument(format!(
                "empty tag in reference '{}'",
                reference
            )));
        }

        Ok(ImageReference {
            name: name.to_string(),
            tag,
            digest,
        })
    }

    /// Path segments of the name (`registry.example.com/ns/repo` has three).
    pub fn segments(&self) -> usize {
        self.name.split('/').count()
    }

    /// Whether the reference names a remote registry path
    /// (`registry/namespace/repository`), which is what gets published.
    pub fn is_registry_path(&self) -> bool {
        self.segments() == 3
    }

    /// Tag to use for runtime calls that need one.
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Reference in the form the runtime pulls from: digests are pinned,
    /// otherwise `name` and the tag are passed separately.
    pub fn pull_name(&self) -> String {
        match self.digest {
            Some(ref digest) => format!("{}@{}", self.name, digest),
            None => self.name.clone(),
        }
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.name.clone();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}
