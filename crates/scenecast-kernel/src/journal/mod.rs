//! Per-request stage journal with wall-clock and monotonic timings

use crate::state_machine::PipelineStage;
use crate::types::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One stage entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Stage entered
    pub stage: PipelineStage,
    /// Wall-clock entry time
    pub entered_at: DateTime<Utc>,
    /// Offset from the start of the run
    pub offset_ms: u64,
}

/// Append-only record of the stages one request went through
#[derive(Debug, Clone)]
pub struct StageJournal {
    request_id: RequestId,
    started: Instant,
    events: Vec<StageEvent>,
}

impl StageJournal {
    /// Start an empty journal; offsets count from now
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            started: Instant::now(),
            events: Vec::new(),
        }
    }

    /// Append an entry for `stage`
    pub fn record(&mut self, stage: PipelineStage) {
        let offset_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.events.push(StageEvent {
            stage,
            entered_at: Utc::now(),
            offset_ms,
        });
    }

    /// Request this journal belongs to
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Entries in recording order
    #[must_use]
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the run ever entered `stage`
    pub fn visited(&self, stage: PipelineStage) -> bool {
        self.events.iter().any(|e| e.stage == stage)
    }

    /// Time spent in `stage`, if it was entered and left
    pub fn time_in(&self, stage: PipelineStage) -> Option<Duration> {
        let idx = self.events.iter().position(|e| e.stage == stage)?;
        let next = self.events.get(idx + 1)?;
        Some(Duration::from_millis(
            next.offset_ms.saturating_sub(self.events[idx].offset_ms),
        ))
    }

    /// Time from `Received` to the last recorded stage
    pub fn total(&self) -> Duration {
        self.events
            .last()
            .map(|e| Duration::from_millis(e.offset_ms))
            .unwrap_or_default()
    }
}
