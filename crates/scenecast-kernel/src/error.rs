//! Error types for the kernel
//!
//! One enum per stage so the orchestrator can tell which stage failed
//! without inspecting messages.

use crate::state_machine::PipelineStage;
use std::path::PathBuf;
use std::time::Duration;

/// Staging directory failures
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Could not create the staging directory
    #[error("failed to create staging directory under {root}: {source}")]
    CreateDir {
        /// Directory the staging area was to be created in
        root: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Could not write the scene source
    #[error("failed to write scene source to {path}: {source}")]
    WriteSource {
        /// Entry file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Could not remove the staging directory
    #[error("failed to remove staging directory {path}: {source}")]
    Cleanup {
        /// Staging directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Render invocation failures
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Renderer binary could not be started
    #[error("failed to spawn renderer '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the renderer failed
    #[error("failed to collect renderer output: {0}")]
    Wait(#[source] std::io::Error),

    /// Renderer exited unsuccessfully
    #[error("renderer exited with status {exit_code}: {}", .stderr.trim())]
    NonZeroExit {
        /// Exit code (-1 when killed by a signal)
        exit_code: i32,
        /// Captured standard error
        stderr: String,
    },

    /// Renderer exceeded its deadline and was killed
    #[error("renderer timed out after {}s", .limit.as_secs())]
    TimedOut {
        /// Configured deadline
        limit: Duration,
    },

    /// Render was cancelled by the caller and the child killed
    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    /// Captured stderr, if the renderer ran to completion
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Artifact resolution failures
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No eligible video in the staging tree
    #[error("no final video found under {root}")]
    NotFound {
        /// Staging directory that was scanned
        root: PathBuf,
    },

    /// A directory in the staging tree could not be read
    #[error("failed to scan {path}: {source}")]
    Scan {
        /// Directory or file being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Illegal pipeline stage transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the allowed table
    #[error("illegal stage transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current stage
        from: PipelineStage,
        /// Requested stage
        to: PipelineStage,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_display_trims_stderr() {
        let err = RenderError::NonZeroExit {
            exit_code: 2,
            stderr: "  NameError: Circle2 is not defined\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "renderer exited with status 2: NameError: Circle2 is not defined"
        );
        assert_eq!(err.stderr(), Some("  NameError: Circle2 is not defined\n"));
    }

    #[test]
    fn timeout_is_distinct_from_exit_failure() {
        let err = RenderError::TimedOut {
            limit: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("timed out after 30s"));
        assert!(err.stderr().is_none());
    }

    #[test]
    fn illegal_transition_names_both_stages() {
        let err = StateMachineError::IllegalTransition {
            from: PipelineStage::Received,
            to: PipelineStage::Rendering,
        };
        assert!(err.to_string().contains("Received -> Rendering"));
    }
}
