//! Isolation Module
//!
//! Every request renders inside its own disposable directory. The directory
//! name combines the request id with a random suffix chosen by `tempfile`,
//! which creates it atomically, so concurrent requests never collide.

use crate::error::StagingError;
use crate::types::{RequestId, SceneSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default staging directory prefix
pub const DEFAULT_PREFIX: &str = "scene_";

/// Default entry file name for the staged source
pub const DEFAULT_ENTRY_FILE: &str = "animation.py";

/// Where and how staging directories are created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingOptions {
    /// Parent directory; the system temp dir when unset
    pub root: Option<PathBuf>,
    /// Directory name prefix
    pub prefix: String,
    /// File name the scene source is written to
    pub entry_file: String,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            root: None,
            prefix: DEFAULT_PREFIX.to_string(),
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
        }
    }
}

impl StagingOptions {
    /// With a specific parent directory
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Allocates staging areas
#[derive(Debug, Clone, Default)]
pub struct Stager {
    options: StagingOptions,
}

impl Stager {
    /// Create a stager
    #[must_use]
    pub fn new(options: StagingOptions) -> Self {
        Self { options }
    }

    /// Staging options in use
    #[must_use]
    pub fn options(&self) -> &StagingOptions {
        &self.options
    }

    /// Allocate an empty staging area for `request_id`
    pub fn allocate(&self, request_id: RequestId) -> Result<StagingArea, StagingError> {
        let root = self.options.resolved_root();
        let prefix = format!("{}{}_", self.options.prefix, request_id);

        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&root)
            .map_err(|source| StagingError::CreateDir { root, source })?;

        let entry_file = dir.path().join(&self.options.entry_file);
        tracing::debug!(path = %dir.path().display(), "allocated staging area");

        Ok(StagingArea {
            dir,
            entry_file,
            request_id,
        })
    }

    /// Allocate a staging area and write `source` into its entry file.
    ///
    /// On a failed write the half-created directory is removed before the
    /// error is returned.
    pub fn stage(&self, request_id: RequestId, source: SceneSource) -> Result<StagingArea, StagingError> {
        let area = self.allocate(request_id)?;

        if let Err(source_err) = std::fs::write(&area.entry_file, source.into_string()) {
            let path = area.entry_file.clone();
            if let Err(cleanup) = area.destroy() {
                tracing::warn!(error = %cleanup, "failed to remove staging area after write error");
            }
            return Err(StagingError::WriteSource {
                path,
                source: source_err,
            });
        }

        Ok(area)
    }
}

/// A private, disposable working directory owned by one request.
///
/// Call [`StagingArea::destroy`] to remove it and observe errors; dropping
/// it removes the directory as well, silently.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    entry_file: PathBuf,
    request_id: RequestId,
}

impl StagingArea {
    /// Directory path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the staged scene source
    #[inline]
    #[must_use]
    pub fn entry_file(&self) -> &Path {
        &self.entry_file
    }

    /// Request owning this area
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Remove the directory and everything in it
    pub fn destroy(self) -> Result<(), StagingError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| StagingError::Cleanup { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "removed staging area");
        Ok(())
    }
}
