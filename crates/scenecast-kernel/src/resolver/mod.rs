//! Artifact Resolver
//!
//! Finds the final video in a staging area after a successful render.
//!
//! The renderer writes fragment files under a reserved directory (the partial
//! marker) next to the final video. Any candidate with that marker as a path
//! component is ignored. Among the rest, the first one in scan order wins;
//! scan order is depth-first with directory entries sorted by name.
//!
//! Symbolic links are never followed, so a resolved artifact always lies
//! inside the scanned tree.

use crate::error::ResolveError;
use crate::isolation::StagingArea;
use crate::types::Artifact;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory the default renderer uses for fragment files
pub const DEFAULT_PARTIAL_MARKER: &str = "partial_movie_files";

/// Default video file extension
pub const DEFAULT_EXTENSION: &str = "mp4";

/// What counts as a final video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Path component marking fragment output
    pub partial_marker: String,
    /// Video extension, compared case-insensitively
    pub extension: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            partial_marker: DEFAULT_PARTIAL_MARKER.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// Locates the final artifact in a staging area
#[derive(Debug, Clone, Default)]
pub struct ArtifactResolver {
    options: ResolverOptions,
}

impl ArtifactResolver {
    /// Create a resolver
    #[must_use]
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    /// Resolve the final video in `area`
    pub fn resolve(&self, area: &StagingArea) -> Result<Artifact, ResolveError> {
        self.resolve_in(area.path())
    }

    /// Resolve the final video under an arbitrary root
    pub fn resolve_in(&self, root: &Path) -> Result<Artifact, ResolveError> {
        let candidates = self.candidates(root)?;
        tracing::debug!(count = candidates.len(), "eligible video candidates");

        if candidates.len() > 1 {
            // Multiple final outputs: selection falls back to scan order.
            tracing::warn!(
                count = candidates.len(),
                chosen = %candidates[0].display(),
                "renderer produced more than one final video"
            );
        }

        let path = candidates
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NotFound { root: root.to_path_buf() })?;

        let size_bytes = std::fs::metadata(&path)
            .map_err(|source| ResolveError::Scan { path: path.clone(), source })?
            .len();

        tracing::info!(path = %path.display(), size_bytes, "resolved artifact");
        Ok(Artifact::new(path, size_bytes))
    }

    /// All eligible videos under `root`, in scan order
    pub fn candidates(&self, root: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        let mut found = Vec::new();
        self.walk(root, root, &mut found)?;
        Ok(found)
    }

    fn walk(&self, root: &Path, dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), ResolveError> {
        let read = std::fs::read_dir(dir).map_err(|source| ResolveError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut entries = read
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ResolveError::Scan {
                path: dir.to_path_buf(),
                source,
            })?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in entries {
            if file_type.is_symlink() {
                tracing::warn!(path = %path.display(), "skipping symlink in staging tree");
            } else if file_type.is_dir() {
                self.walk(root, &path, found)?;
            } else if file_type.is_file()
                && self.is_video(&path)
                && !self.is_partial(root, &path)
                && is_contained(root, &path)
            {
                found.push(path);
            }
        }
        Ok(())
    }

    fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.options.extension))
    }

    fn is_partial(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative
            .components()
            .any(|c| c.as_os_str() == self.options.partial_marker.as_str())
    }
}

/// `path` resolves to a location under `root`
fn is_contained(root: &Path, path: &Path) -> bool {
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"video").unwrap();
    }

    #[test]
    fn picks_final_video_over_partials() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "media/videos/animation/480p15/partial_movie_files/Scene/001.mp4");
        touch(root.path(), "media/videos/animation/480p15/output.mp4");

        let artifact = ArtifactResolver::default().resolve_in(root.path()).unwrap();
        assert!(artifact.path().ends_with("480p15/output.mp4"));
        assert_eq!(artifact.size_bytes(), 5);
    }

    #[test]
    fn partials_scanned_first_are_still_skipped() {
        let root = tempfile::tempdir().unwrap();
        // "a/..." sorts, and so is scanned, before "b/..."
        touch(root.path(), "a/partial_movie_files/frag.mp4");
        touch(root.path(), "b/output.mp4");

        let resolver = ArtifactResolver::default();
        let candidates = resolver.candidates(root.path()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(resolver.resolve_in(root.path()).unwrap().path().ends_with("b/output.mp4"));
    }

    #[test]
    fn marker_must_be_a_whole_component() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "not_partial_movie_files_dir/output.mp4");

        let artifact = ArtifactResolver::default().resolve_in(root.path()).unwrap();
        assert!(artifact.path().ends_with("output.mp4"));
    }

    #[test]
    fn only_partials_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "media/partial_movie_files/frag.mp4");
        touch(root.path(), "media/images/preview.png");

        let err = ArtifactResolver::default().resolve_in(root.path()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn extension_match_ignores_case() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "out/OUTPUT.MP4");

        assert!(ArtifactResolver::default().resolve_in(root.path()).is_ok());
    }

    #[test]
    fn multiple_finals_pick_first_in_scan_order() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "media/videos/animation/480p15/SceneB.mp4");
        touch(root.path(), "media/videos/animation/480p15/SceneA.mp4");

        let artifact = ArtifactResolver::default().resolve_in(root.path()).unwrap();
        assert!(artifact.path().ends_with("SceneA.mp4"));
    }

    #[test]
    fn missing_root_is_a_scan_error() {
        let root = tempfile::tempdir().unwrap();
        let err = ArtifactResolver::default()
            .resolve_in(&root.path().join("gone"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Scan { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_tree_are_not_followed() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "x/secret.mp4");
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("x/secret.mp4"),
            root.path().join("direct.mp4"),
        )
        .unwrap();

        let err = ArtifactResolver::default().resolve_in(root.path()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));

        touch(root.path(), "media/output.mp4");
        let artifact = ArtifactResolver::default().resolve_in(root.path()).unwrap();
        assert!(artifact.path().starts_with(root.path()));
        assert!(artifact.path().ends_with("media/output.mp4"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_does_not_recurse() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a")).unwrap();
        std::os::unix::fs::symlink(root.path(), root.path().join("a/loop")).unwrap();
        touch(root.path(), "b/output.mp4");

        let candidates = ArtifactResolver::default().candidates(root.path()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].ends_with("b/output.mp4"));
    }
}
