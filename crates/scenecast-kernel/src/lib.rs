//! SceneCast Kernel (scenecast-kernel)
//!
//! Filesystem and process primitives the animation pipeline is built on:
//! 1. **Isolation**: one disposable staging directory per request
//! 2. **Execution**: the external render engine, run inside that directory
//! 3. **Resolution**: locating the final video among the renderer's output
//!
//! Stage sequencing lives in [`state_machine`]; the orchestrator itself is in
//! `scenecast-core`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scenecast_kernel::prelude::*;
//!
//! let stager = Stager::new(StagingOptions::default());
//! let area = stager.stage(RequestId::new(), source)?;
//!
//! let renderer = ProcessRenderer::new(RendererOptions::default());
//! renderer.render(&area, Quality::Low, &CancellationToken::new()).await?;
//!
//! let artifact = ArtifactResolver::new(ResolverOptions::default()).resolve(&area)?;
//! area.destroy()?;
//! ```

// Core modules
pub mod error;
pub mod executor;
pub mod isolation;
pub mod journal;
pub mod resolver;
pub mod state_machine;
pub mod types;

// Re-exports
pub use error::*;
pub use types::*;

pub use tokio_util::sync::CancellationToken;

/// Re-export the commonly used kernel types
pub mod prelude {
    pub use crate::error::{RenderError, ResolveError, StagingError, StateMachineError};
    pub use crate::executor::{ProcessRenderer, RenderEngine, RendererOptions};
    pub use crate::isolation::{Stager, StagingArea, StagingOptions};
    pub use crate::journal::{StageEvent, StageJournal};
    pub use crate::resolver::{ArtifactResolver, ResolverOptions};
    pub use crate::state_machine::{PipelineStage, StageTracker};
    pub use crate::types::{Artifact, Quality, RenderResult, RequestId, SceneSource};
    pub use tokio_util::sync::CancellationToken;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
