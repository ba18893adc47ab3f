//! Delivery interface
//!
//! The pipeline deletes the staging area right after `deliver` returns, so an
//! implementation must finish with the artifact file before returning.

use crate::error::DeliveryError;
use scenecast_kernel::Artifact;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default caption shown with a delivered video
pub const DEFAULT_CAPTION: &str = "Here's your animation!";

/// Frontend boundary
#[async_trait::async_trait]
pub trait Delivery: Send + Sync {
    /// Hand over the video with a short caption
    async fn deliver(&self, artifact: &Artifact, caption: &str) -> Result<(), DeliveryError>;
}

/// Copies delivered videos into a directory as `animation-{n}.mp4`
#[derive(Debug)]
pub struct FileDelivery {
    out_dir: PathBuf,
    next_index: AtomicU64,
}

impl FileDelivery {
    /// Deliver into `out_dir`, numbering from `first_index`
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, first_index: u64) -> Self {
        Self {
            out_dir: out_dir.into(),
            next_index: AtomicU64::new(first_index),
        }
    }

    /// Output directory
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn target_for(&self, artifact: &Artifact, index: u64) -> PathBuf {
        let extension = artifact
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        self.out_dir.join(format!("animation-{index}.{extension}"))
    }
}

#[async_trait::async_trait]
impl Delivery for FileDelivery {
    async fn deliver(&self, artifact: &Artifact, caption: &str) -> Result<(), DeliveryError> {
        if !tokio::fs::try_exists(artifact.path()).await.unwrap_or(false) {
            return Err(DeliveryError::Missing(artifact.path().to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|source| DeliveryError::Io {
                path: self.out_dir.clone(),
                source,
            })?;

        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let target = self.target_for(artifact, index);
        tokio::fs::copy(artifact.path(), &target)
            .await
            .map_err(|source| DeliveryError::Io {
                path: target.clone(),
                source,
            })?;

        tracing::info!(target = %target.display(), "delivered animation");
        println!("{caption} {}", target.display());
        Ok(())
    }
}
