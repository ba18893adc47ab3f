//! Testing utilities for the SceneCast workspace
//!
//! Scripted stand-ins for the code-generation service, the renderer and the
//! delivery frontend, plus fixture helpers.

#![allow(missing_docs)]

use scenecast_core::{
    ChatMessage, CodeGenerator, Delivery, DeliveryError, GenerationError, GenerationParams,
    Pipeline, SceneSynthesizer,
};
use scenecast_kernel::prelude::*;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scene a well-behaved service returns for "a circle turning into a square"
pub const CIRCLE_TO_SQUARE: &str = "from manim import *

class CircleToSquare(Scene):
    def construct(self):
        circle = Circle(color=BLUE)
        square = Square(color=RED)
        self.play(Create(circle))
        self.wait(0.5)
        self.play(Transform(circle, square))
        self.wait(1)
";

/// The same scene wrapped in a Markdown fence, as chat models tend to reply
pub fn fenced(source: &str) -> String {
    format!("```python\n{source}```\n")
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// Replays queued replies in order; the last one repeats once the queue is
/// down to a single entry
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `reply`
    pub fn always(reply: impl Into<String>) -> Self {
        Self::new([Ok(reply.into())])
    }

    /// Always fail with `error`
    pub fn failing(error: GenerationError) -> Self {
        Self::new([Err(error)])
    }

    /// Number of service calls made
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Messages of every call, in order
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _params: GenerationParams,
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut replies = self.replies.lock().unwrap();
        match replies.len() {
            0 => Err(GenerationError::Empty),
            1 => replies[0].clone(),
            _ => replies.pop_front().unwrap_or(Err(GenerationError::Empty)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// What a [`FakeRenderer`] does when invoked
#[derive(Debug, Clone)]
pub enum FakeRender {
    /// Lay out partial fragments and a final video, exit 0
    Success,
    /// Lay out partial fragments and several final videos, exit 0
    MultipleFinals(Vec<String>),
    /// Exit non-zero with `stderr`
    Exit { code: i32, stderr: String },
    /// Exit 0 leaving only partial fragments behind
    PartialsOnly,
    /// Exit 0 without writing anything
    NoOutput,
    /// Block until cancelled
    Hang,
    /// Leave partial fragments and report the deadline as exceeded
    TimedOut(Duration),
}

/// Writes the directory layout the real renderer produces
#[derive(Debug)]
pub struct FakeRenderer {
    behavior: FakeRender,
    output_name: String,
    flags: Mutex<Vec<&'static str>>,
    areas: Mutex<Vec<PathBuf>>,
}

impl FakeRenderer {
    pub fn new(behavior: FakeRender) -> Self {
        Self {
            behavior,
            output_name: "output".to_string(),
            flags: Mutex::new(Vec::new()),
            areas: Mutex::new(Vec::new()),
        }
    }

    pub fn success() -> Self {
        Self::new(FakeRender::Success)
    }

    pub fn failing(code: i32, stderr: impl Into<String>) -> Self {
        Self::new(FakeRender::Exit {
            code,
            stderr: stderr.into(),
        })
    }

    /// Quality flags of every invocation
    pub fn flags(&self) -> Vec<&'static str> {
        self.flags.lock().unwrap().clone()
    }

    /// Staging areas rendered in
    pub fn areas(&self) -> Vec<PathBuf> {
        self.areas.lock().unwrap().clone()
    }

    /// Per-quality output directory, relative to the staging area
    pub fn video_dir(quality: Quality) -> PathBuf {
        let resolution = match quality {
            Quality::Low => "480p15",
            Quality::Medium => "720p30",
            Quality::High => "1080p60",
        };
        Path::new("media/videos/animation").join(resolution)
    }

    fn write_partials(dir: &Path) {
        let partial = dir.join("partial_movie_files/CircleToSquare");
        std::fs::create_dir_all(&partial).unwrap();
        for i in 0..3 {
            std::fs::write(partial.join(format!("{i:05}.mp4")), b"fragment").unwrap();
        }
    }

    fn write_final(dir: &Path, name: &str) {
        std::fs::write(dir.join(format!("{name}.mp4")), b"final video").unwrap();
    }

    fn exited(code: i32, stderr: &str) -> RenderResult {
        RenderResult {
            exit_code: code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RenderEngine for FakeRenderer {
    async fn render(
        &self,
        area: &StagingArea,
        quality: Quality,
        cancel: &CancellationToken,
    ) -> Result<RenderResult, RenderError> {
        self.flags.lock().unwrap().push(quality.render_flag());
        self.areas.lock().unwrap().push(area.path().to_path_buf());
        assert!(area.entry_file().exists(), "scene source was not staged");

        let dir = area.path().join(Self::video_dir(quality));
        match &self.behavior {
            FakeRender::Success => {
                Self::write_partials(&dir);
                Self::write_final(&dir, &self.output_name);
                Ok(Self::exited(0, ""))
            }
            FakeRender::MultipleFinals(names) => {
                Self::write_partials(&dir);
                for name in names {
                    Self::write_final(&dir, name);
                }
                Ok(Self::exited(0, ""))
            }
            FakeRender::Exit { code, stderr } => Err(RenderError::NonZeroExit {
                exit_code: *code,
                stderr: stderr.clone(),
            }),
            FakeRender::PartialsOnly => {
                Self::write_partials(&dir);
                Ok(Self::exited(0, ""))
            }
            FakeRender::NoOutput => Ok(Self::exited(0, "")),
            FakeRender::TimedOut(limit) => {
                Self::write_partials(&dir);
                Err(RenderError::TimedOut { limit: *limit })
            }
            FakeRender::Hang => {
                tokio::select! {
                    () = cancel.cancelled() => Err(RenderError::Cancelled),
                    () = tokio::time::sleep(Duration::from_secs(300)) => Ok(Self::exited(0, "")),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// One accepted delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// Accepts every artifact, reading its bytes before the staging area goes away
#[derive(Debug, Default)]
pub struct RecordingDelivery {
    delivered: Mutex<Vec<Delivered>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, artifact: &Artifact, caption: &str) -> Result<(), DeliveryError> {
        let bytes = std::fs::read(artifact.path()).map_err(|source| DeliveryError::Io {
            path: artifact.path().to_path_buf(),
            source,
        })?;
        self.delivered.lock().unwrap().push(Delivered {
            path: artifact.path().to_path_buf(),
            bytes,
            caption: caption.to_string(),
        });
        Ok(())
    }
}

/// Rejects every artifact
#[derive(Debug, Default)]
pub struct FailingDelivery;

#[async_trait::async_trait]
impl Delivery for FailingDelivery {
    async fn deliver(&self, _artifact: &Artifact, _caption: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected("frontend unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Pipeline staging under `root`
pub fn pipeline_in(
    root: &Path,
    generator: Arc<dyn CodeGenerator>,
    renderer: Arc<dyn RenderEngine>,
) -> Pipeline {
    Pipeline::new(
        SceneSynthesizer::new(generator),
        Stager::new(StagingOptions::default().with_root(root)),
        renderer,
        ArtifactResolver::default(),
    )
}

/// Number of entries directly under `dir`
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}
