//! Pipeline stage state machine
//!
//! `Received → Synthesizing → Staging → Rendering → Resolving → Delivering → Delivered`,
//! with any non-terminal stage allowed to drop into `Failed`. Strictly forward.

use crate::error::StateMachineError;
use crate::journal::StageJournal;
use crate::types::RequestId;
use serde::{Deserialize, Serialize};

/// Stage of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Request accepted, nothing done yet
    Received,
    /// Waiting on the code-generation service
    Synthesizing,
    /// Writing the source into a staging area
    Staging,
    /// Render engine running
    Rendering,
    /// Scanning for the final video
    Resolving,
    /// Handing the video to the delivery interface
    Delivering,
    /// Terminal: video delivered
    Delivered,
    /// Terminal: a stage failed
    Failed,
}

impl PipelineStage {
    /// Whether no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Delivered | PipelineStage::Failed)
    }
}

/// Validates a stage transition.
///
/// Illegal transitions are programming errors in the orchestrator; they are
/// returned rather than panicking so tests can observe them.
pub fn validate_transition(from: PipelineStage, to: PipelineStage) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// Stages reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: PipelineStage) -> Vec<PipelineStage> {
    match from {
        PipelineStage::Received => vec![PipelineStage::Synthesizing, PipelineStage::Failed],
        PipelineStage::Synthesizing => vec![PipelineStage::Staging, PipelineStage::Failed],
        PipelineStage::Staging => vec![PipelineStage::Rendering, PipelineStage::Failed],
        PipelineStage::Rendering => vec![PipelineStage::Resolving, PipelineStage::Failed],
        PipelineStage::Resolving => vec![PipelineStage::Delivering, PipelineStage::Failed],
        PipelineStage::Delivering => vec![PipelineStage::Delivered, PipelineStage::Failed],
        PipelineStage::Delivered | PipelineStage::Failed => vec![],
    }
}

fn allowed(from: PipelineStage, to: PipelineStage) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Tracks the current stage of one request and journals every entry
#[derive(Debug)]
pub struct StageTracker {
    current: PipelineStage,
    failed_at: Option<PipelineStage>,
    journal: StageJournal,
}

impl StageTracker {
    /// Start a tracker in `Received`
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        let mut journal = StageJournal::new(request_id);
        journal.record(PipelineStage::Received);
        Self {
            current: PipelineStage::Received,
            failed_at: None,
            journal,
        }
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Stage that was active when the run failed
    #[inline]
    #[must_use]
    pub fn failed_at(&self) -> Option<PipelineStage> {
        self.failed_at
    }

    /// Move to the next stage
    pub fn advance(&mut self, to: PipelineStage) -> Result<(), StateMachineError> {
        validate_transition(self.current, to)?;
        tracing::info!(request_id = %self.journal.request_id(), stage = ?to, "entering stage");
        self.current = to;
        self.journal.record(to);
        Ok(())
    }

    /// Drop into `Failed`, remembering the stage that failed.
    ///
    /// Returns the failing stage. Calling it on a terminal tracker leaves it unchanged.
    pub fn fail(&mut self) -> PipelineStage {
        if let Some(stage) = self.failed_at {
            return stage;
        }
        let stage = self.current;
        if validate_transition(stage, PipelineStage::Failed).is_ok() {
            self.failed_at = Some(stage);
            self.current = PipelineStage::Failed;
            self.journal.record(PipelineStage::Failed);
        }
        stage
    }

    /// Finish tracking and hand back the journal
    #[must_use]
    pub fn into_journal(self) -> StageJournal {
        self.journal
    }
}
