//! Error types for the pipeline
//!
//! Provides the error taxonomy for:
//! - Scene generation failures
//! - Delivery failures
//! - Whole-pipeline failures tagged with the stage they happened in
//! - Configuration loading

use scenecast_kernel::state_machine::PipelineStage;
use scenecast_kernel::{RenderError, ResolveError, StagingError, StateMachineError};
use std::path::PathBuf;
use std::time::Duration;

/// Scene synthesis failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Nothing to animate
    #[error("description is empty")]
    EmptyDescription,

    /// The code-generation service rejected or failed the call
    #[error("code generation service failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Service {
        /// HTTP status, when there was a response
        status: Option<u16>,
        /// Service error message
        message: String,
        /// Whether an identical call may succeed later
        retryable: bool,
    },

    /// The service did not answer in time
    #[error("code generation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The service answered with nothing usable
    #[error("code generation returned no scene source")]
    Empty,

    /// Cancelled while waiting on the service
    #[error("code generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Service error helper
    #[must_use]
    pub fn service(message: impl Into<String>, retryable: bool) -> Self {
        Self::Service {
            status: None,
            message: message.into(),
            retryable,
        }
    }

    /// Whether a caller-driven retry is reasonable.
    ///
    /// The pipeline never retries on its own.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service { retryable, .. } => *retryable,
            Self::TimedOut(_) | Self::Empty => true,
            Self::EmptyDescription | Self::Cancelled => false,
        }
    }
}

/// Frontend rejected the artifact
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Artifact vanished before it could be delivered
    #[error("artifact not found at {0}")]
    Missing(PathBuf),

    /// I/O while handing over the artifact
    #[error("failed to deliver {path}: {source}")]
    Io {
        /// Path being delivered
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Frontend-specific rejection
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Scene synthesis failed
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Staging filesystem failure
    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),

    /// Renderer failed, timed out or was cancelled
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Renderer succeeded but left no usable video
    #[error("artifact not found: {0}")]
    ArtifactNotFound(#[from] ResolveError),

    /// Frontend rejected the video
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// Caller cancelled between stages
    #[error("request cancelled")]
    Cancelled,

    /// Orchestrator attempted an illegal stage transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

impl PipelineError {
    /// Whether the request was cancelled, at whatever stage
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Render(RenderError::Cancelled)
                | Self::Generation(GenerationError::Cancelled)
        )
    }

    /// Short message safe to show an end user.
    ///
    /// Never includes stderr, paths or service error text.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        if self.is_cancelled() {
            return "The animation request was cancelled.";
        }
        match self {
            Self::Generation(GenerationError::EmptyDescription) => {
                "Please describe the animation you would like to see."
            }
            Self::Generation(_) => {
                "Sorry, I couldn't generate an animation for your request. Please try a different description."
            }
            Self::Staging(_) => "Failed to create animation file. Please try again.",
            Self::Render(RenderError::TimedOut { .. }) => {
                "Rendering took too long and was stopped. Try a lower quality setting."
            }
            Self::Render(_) => "Failed to render animation. Please try again.",
            Self::ArtifactNotFound(_) => {
                "The renderer finished but produced no video. Please try a different description."
            }
            Self::Delivery(_) => "The animation was rendered but could not be displayed.",
            Self::Cancelled | Self::StateMachine(_) => "An internal error occurred. Please try again.",
        }
    }
}

/// A terminal failure, tagged with the stage it happened in
#[derive(Debug, thiserror::Error)]
#[error("{stage:?} failed: {error}")]
pub struct StageFailure {
    /// Stage that was active
    pub stage: PipelineStage,
    /// What went wrong
    #[source]
    pub error: PipelineError,
}

impl StageFailure {
    /// Create a failure record
    #[must_use]
    pub fn new(stage: PipelineStage, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    /// Short message safe to show an end user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.error.user_message()
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override has the wrong shape
    #[error("invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },
}
