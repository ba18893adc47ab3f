//! SceneCast Core
//!
//! The pipeline that turns a natural-language description into a rendered
//! animation:
//! - Synthesizes scene source through a code-generation service
//! - Stages it in a private directory and renders it
//! - Resolves the final video and hands it to a delivery interface
//! - Cleans up after every outcome and reports which stage failed
//!
//! # Example
//!
//! ```rust,ignore
//! use scenecast_core::prelude::*;
//!
//! # async fn example(generator: std::sync::Arc<dyn CodeGenerator>) {
//! let config = PipelineConfig::resolve(None)?;
//! let pipeline = Pipeline::from_config(&config, generator);
//!
//! let request = Request::new("a circle turning into a square").with_quality(Quality::Low);
//! let report = pipeline.run(&request, &FileDelivery::new("out", 1)).await;
//!
//! if let Some(message) = report.user_message() {
//!     println!("{message}");
//! }
//! # }
//! ```

// Core modules
pub mod config;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod render_pool;
pub mod synthesizer;
pub mod types;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use delivery::{Delivery, FileDelivery, DEFAULT_CAPTION};
pub use error::{ConfigError, DeliveryError, GenerationError, PipelineError, StageFailure};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineReport};
pub use render_pool::{RenderPool, RenderPoolStats};
pub use synthesizer::{ChatMessage, CodeGenerator, GenerationParams, SceneSynthesizer};
pub use types::{ConversationHistory, Request, Role, Turn, MAX_CONTEXT_TURNS};

pub use scenecast_kernel as kernel;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        ChatMessage, CodeGenerator, ConversationHistory, Delivery, FileDelivery,
        GenerationError, GenerationParams, Pipeline, PipelineConfig, PipelineError,
        PipelineOutcome, PipelineReport, RenderPool, RenderPoolStats, Request, Role,
        SceneSynthesizer, StageFailure, Turn,
    };
    pub use scenecast_kernel::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use crate::synthesizer::MockCodeGenerator;
    use std::sync::Arc;

    #[tokio::test]
    async fn generation_failure_stops_before_staging() {
        let root = tempfile::tempdir().unwrap();
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate()
            .returning(|_, _| Err(GenerationError::service("model overloaded", true)));

        let config = PipelineConfig {
            staging: StagingOptions::default().with_root(root.path()),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::from_config(&config, Arc::new(mock));
        let out = tempfile::tempdir().unwrap();

        let report = pipeline
            .run(&Request::new("a bouncing ball"), &FileDelivery::new(out.path(), 1))
            .await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, PipelineStage::Synthesizing);
        assert!(matches!(failure.error, PipelineError::Generation(_)));
        assert!(report.staging_path.is_none());
        assert!(!report.journal.visited(PipelineStage::Staging));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn request_builder_with_history() {
        let history: ConversationHistory = vec![Turn::user("a red dot")].into_iter().collect();
        let request = Request::new("make it blue")
            .with_history(history)
            .with_quality(Quality::from_label("high"));

        assert_eq!(request.quality(), Quality::High);
        assert_eq!(request.history().turns()[0].role, Role::User);
    }
}
