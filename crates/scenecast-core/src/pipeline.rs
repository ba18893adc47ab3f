//! Pipeline Orchestrator
//!
//! Drives one request through
//! `Received → Synthesizing → Staging → Rendering → Resolving → Delivering → Delivered`,
//! dropping into `Failed` at the first error.
//!
//! # Critical Invariant
//!
//! Whatever the outcome, the request's staging area no longer exists once
//! [`Pipeline::run`] returns. Cleanup errors are logged and never change the
//! outcome.

use crate::config::PipelineConfig;
use crate::delivery::{Delivery, DEFAULT_CAPTION};
use crate::error::{PipelineError, StageFailure};
use crate::render_pool::RenderPool;
use crate::synthesizer::{CodeGenerator, SceneSynthesizer};
use crate::types::Request;
use scenecast_kernel::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// How a run ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The artifact was handed to the delivery interface.
    ///
    /// Its path pointed into the staging area, which has been removed since.
    Delivered {
        /// Delivered video
        artifact: Artifact,
    },
    /// The run stopped at a stage
    Failed(StageFailure),
}

/// Result of one run
#[derive(Debug)]
pub struct PipelineReport {
    /// Request that was run
    pub request_id: RequestId,
    /// Staging directory the request used, if one was created
    pub staging_path: Option<PathBuf>,
    /// Stage entries with timestamps
    pub journal: StageJournal,
    /// Terminal outcome
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    /// Whether the run reached `Delivered`
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Delivered { .. })
    }

    /// Delivered artifact
    #[must_use]
    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            PipelineOutcome::Delivered { artifact } => Some(artifact),
            PipelineOutcome::Failed(_) => None,
        }
    }

    /// Failure record
    #[must_use]
    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            PipelineOutcome::Failed(failure) => Some(failure),
            PipelineOutcome::Delivered { .. } => None,
        }
    }

    /// Message to show the user when the run failed
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        self.failure().map(StageFailure::user_message)
    }
}

/// The orchestrator.
///
/// Holds no per-request state; one instance can serve concurrent runs.
pub struct Pipeline {
    synthesizer: SceneSynthesizer,
    stager: Stager,
    renderer: Arc<dyn RenderEngine>,
    resolver: ArtifactResolver,
    caption: String,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("synthesizer", &self.synthesizer)
            .field("stager", &self.stager)
            .field("resolver", &self.resolver)
            .field("caption", &self.caption)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assemble a pipeline from its stages
    #[must_use]
    pub fn new(
        synthesizer: SceneSynthesizer,
        stager: Stager,
        renderer: Arc<dyn RenderEngine>,
        resolver: ArtifactResolver,
    ) -> Self {
        Self {
            synthesizer,
            stager,
            renderer,
            resolver,
            caption: DEFAULT_CAPTION.to_string(),
        }
    }

    /// Pipeline using the process renderer behind a [`RenderPool`]
    #[must_use]
    pub fn from_config(config: &PipelineConfig, generator: Arc<dyn CodeGenerator>) -> Self {
        let renderer = ProcessRenderer::new(config.renderer.clone());
        let pool = RenderPool::new(Arc::new(renderer), config.max_concurrent_renders);
        let synthesizer = match config.generation_timeout() {
            Some(limit) => SceneSynthesizer::new(generator).with_timeout(limit),
            None => SceneSynthesizer::new(generator).without_timeout(),
        };

        Self::new(
            synthesizer,
            Stager::new(config.staging.clone()),
            Arc::new(pool),
            ArtifactResolver::new(config.resolver.clone()),
        )
        .with_caption(config.caption.clone())
    }

    /// With a delivery caption
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Delivery caption
    #[must_use]
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Run a request to completion
    pub async fn run(&self, request: &Request, delivery: &dyn Delivery) -> PipelineReport {
        self.run_with_cancel(request, delivery, &CancellationToken::new())
            .await
    }

    /// Run a request, stopping early when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        request: &Request,
        delivery: &dyn Delivery,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let span = tracing::info_span!("pipeline", request_id = %request.id());
        self.execute(request, delivery, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        request: &Request,
        delivery: &dyn Delivery,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        tracing::info!(
            quality = %request.quality(),
            history = request.history().len(),
            "request received"
        );

        let mut tracker = StageTracker::new(request.id());
        let mut area = None;

        let outcome = match self
            .drive(request, delivery, cancel, &mut tracker, &mut area)
            .await
        {
            Ok(artifact) => {
                tracing::info!(size_bytes = artifact.size_bytes(), "request delivered");
                PipelineOutcome::Delivered { artifact }
            }
            Err(error) => {
                let stage = tracker.fail();
                log_failure(stage, &error);
                PipelineOutcome::Failed(StageFailure::new(stage, error))
            }
        };

        let staging_path = area.as_ref().map(|a: &StagingArea| a.path().to_path_buf());
        if let Some(area) = area {
            cleanup(area);
        }

        PipelineReport {
            request_id: request.id(),
            staging_path,
            journal: tracker.into_journal(),
            outcome,
        }
    }

    async fn drive(
        &self,
        request: &Request,
        delivery: &dyn Delivery,
        cancel: &CancellationToken,
        tracker: &mut StageTracker,
        area: &mut Option<StagingArea>,
    ) -> Result<Artifact, PipelineError> {
        enter(tracker, PipelineStage::Synthesizing, cancel)?;
        let source = self
            .synthesizer
            .synthesize(request.description(), request.history(), cancel)
            .await?;

        enter(tracker, PipelineStage::Staging, cancel)?;
        let staged = area.insert(self.stager.stage(request.id(), source)?);

        enter(tracker, PipelineStage::Rendering, cancel)?;
        let result = self
            .renderer
            .render(staged, request.quality(), cancel)
            .await?;
        log_render_output(&result);
        if !result.success() {
            return Err(RenderError::NonZeroExit {
                exit_code: result.exit_code,
                stderr: result.stderr,
            }
            .into());
        }

        enter(tracker, PipelineStage::Resolving, cancel)?;
        let artifact = self.resolver.resolve(staged)?;

        enter(tracker, PipelineStage::Delivering, cancel)?;
        delivery.deliver(&artifact, &self.caption).await?;

        tracker.advance(PipelineStage::Delivered)?;
        Ok(artifact)
    }
}

/// Advance to `stage`, then honour a pending cancellation
fn enter(
    tracker: &mut StageTracker,
    stage: PipelineStage,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    tracker.advance(stage)?;
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn log_render_output(result: &RenderResult) {
    tracing::debug!(
        exit_code = result.exit_code,
        stdout = %result.stdout,
        stderr = %result.stderr,
        "renderer finished"
    );
}

fn log_failure(stage: PipelineStage, error: &PipelineError) {
    if error.is_cancelled() {
        tracing::warn!(stage = ?stage, "request cancelled");
        return;
    }
    match error {
        PipelineError::Render(render) => tracing::error!(
            stage = ?stage,
            error = %render,
            stderr = render.stderr().unwrap_or_default(),
            "request failed"
        ),
        other => tracing::error!(stage = ?stage, error = %other, detail = ?other, "request failed"),
    }
}

fn cleanup(area: StagingArea) {
    let path = area.path().to_path_buf();
    if let Err(error) = area.destroy() {
        tracing::warn!(path = %path.display(), %error, "failed to remove staging area");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::synthesizer::MockCodeGenerator;
    use std::path::Path;
    use std::sync::Mutex;

    const SCENE: &str = "from manim import *\n\nclass Demo(Scene):\n    def construct(self):\n        self.play(Create(Circle()))\n";

    /// Writes a final video and reports the flags it saw
    #[derive(Default)]
    struct StubEngine {
        flags: Mutex<Vec<&'static str>>,
    }

    #[async_trait::async_trait]
    impl RenderEngine for StubEngine {
        async fn render(
            &self,
            area: &StagingArea,
            quality: Quality,
            _cancel: &CancellationToken,
        ) -> Result<RenderResult, RenderError> {
            self.flags.lock().unwrap().push(quality.render_flag());
            let dir = area.path().join("media/videos/animation/480p15");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("output.mp4"), b"mp4").unwrap();
            Ok(RenderResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    /// Exits non-zero without raising an error itself
    struct SilentFailure;

    #[async_trait::async_trait]
    impl RenderEngine for SilentFailure {
        async fn render(
            &self,
            _area: &StagingArea,
            _quality: Quality,
            _cancel: &CancellationToken,
        ) -> Result<RenderResult, RenderError> {
            Ok(RenderResult {
                exit_code: 2,
                stdout: String::new(),
                stderr: "NameError: name 'Sqaure' is not defined".to_string(),
            })
        }
    }

    struct Accept;

    #[async_trait::async_trait]
    impl Delivery for Accept {
        async fn deliver(&self, artifact: &Artifact, caption: &str) -> Result<(), DeliveryError> {
            assert!(artifact.path().exists());
            assert_eq!(caption, DEFAULT_CAPTION);
            Ok(())
        }
    }

    fn generator() -> Arc<dyn CodeGenerator> {
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate().returning(|_, _| Ok(SCENE.to_string()));
        Arc::new(mock)
    }

    fn pipeline(root: &Path, renderer: Arc<dyn RenderEngine>) -> Pipeline {
        Pipeline::new(
            SceneSynthesizer::new(generator()),
            Stager::new(StagingOptions::default().with_root(root)),
            renderer,
            ArtifactResolver::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_visits_every_stage() {
        let root = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::default());
        let report = pipeline(root.path(), engine.clone())
            .run(&Request::new("a dot").with_quality(Quality::High), &Accept)
            .await;

        assert!(report.is_delivered());
        assert!(report.user_message().is_none());
        let stages: Vec<_> = report.journal.events().iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                PipelineStage::Received,
                PipelineStage::Synthesizing,
                PipelineStage::Staging,
                PipelineStage::Rendering,
                PipelineStage::Resolving,
                PipelineStage::Delivering,
                PipelineStage::Delivered,
            ]
        );
        assert_eq!(*engine.flags.lock().unwrap(), vec!["-qh"]);
        assert!(!report.staging_path.unwrap().exists());
    }

    #[tokio::test]
    async fn non_zero_result_is_a_render_failure() {
        let root = tempfile::tempdir().unwrap();
        let report = pipeline(root.path(), Arc::new(SilentFailure))
            .run(&Request::new("a square"), &Accept)
            .await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, PipelineStage::Rendering);
        assert!(matches!(
            &failure.error,
            PipelineError::Render(RenderError::NonZeroExit { exit_code: 2, stderr }) if stderr.contains("NameError")
        ));
        assert!(!report.journal.visited(PipelineStage::Resolving));
        assert!(!report.staging_path.unwrap().exists());
    }

    #[tokio::test]
    async fn pre_cancelled_request_never_calls_the_service() {
        let root = tempfile::tempdir().unwrap();
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate().never();
        let pipeline = Pipeline::new(
            SceneSynthesizer::new(Arc::new(mock)),
            Stager::new(StagingOptions::default().with_root(root.path())),
            Arc::new(StubEngine::default()),
            ArtifactResolver::default(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline
            .run_with_cancel(&Request::new("a dot"), &Accept, &cancel)
            .await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.stage, PipelineStage::Synthesizing);
        assert!(failure.error.is_cancelled());
        assert!(report.staging_path.is_none());
    }

    #[test]
    fn from_config_carries_caption() {
        let config = PipelineConfig {
            caption: "Enjoy".to_string(),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::from_config(&config, generator());
        assert_eq!(pipeline.caption(), "Enjoy");
    }
}
