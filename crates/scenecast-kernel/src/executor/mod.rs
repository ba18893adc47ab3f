//! Render Invoker
//!
//! Runs the external render engine inside a staging area. The child's
//! stdout and stderr are captured for diagnostics, never streamed.
//!
//! # Critical Invariant
//!
//! A zero exit status does not mean a video exists; the resolver checks that.
//! A child abandoned by timeout or cancellation is killed, not left running.

use crate::error::RenderError;
use crate::isolation::StagingArea;
use crate::types::{Quality, RenderResult};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default render engine binary
pub const DEFAULT_PROGRAM: &str = "manim";

/// Default base name for the rendered video
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// Render engine boundary
///
/// Implement this trait to plug in a different way of producing the video.
#[async_trait::async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render the staged source at `quality`.
    ///
    /// # Errors
    /// `RenderError::NonZeroExit` carries the captured stderr.
    async fn render(
        &self,
        area: &StagingArea,
        quality: Quality,
        cancel: &CancellationToken,
    ) -> Result<RenderResult, RenderError>;
}

/// How to invoke the render engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    /// Program to run
    pub program: String,
    /// Arguments placed before the quality flag
    pub leading_args: Vec<String>,
    /// Fixed output base name passed with `-o`
    pub output_name: String,
    /// Deadline for one render; unbounded when unset
    pub timeout_secs: Option<u64>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            leading_args: Vec::new(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            timeout_secs: None,
        }
    }
}

impl RendererOptions {
    /// Deadline as a duration
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Renders by spawning the engine as a child process
#[derive(Debug, Clone, Default)]
pub struct ProcessRenderer {
    options: RendererOptions,
}

impl ProcessRenderer {
    /// Create a renderer
    #[must_use]
    pub fn new(options: RendererOptions) -> Self {
        Self { options }
    }

    /// Options in use
    #[must_use]
    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Full argument list for one invocation
    #[must_use]
    pub fn command_args(&self, area: &StagingArea, quality: Quality) -> Vec<String> {
        let mut args = self.options.leading_args.clone();
        args.push(quality.render_flag().to_string());
        args.push("-o".to_string());
        args.push(self.options.output_name.clone());
        args.push(area.entry_file().to_string_lossy().into_owned());
        args
    }

    /// Whether the configured program can be started
    pub async fn is_available(&self) -> bool {
        Command::new(&self.options.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl RenderEngine for ProcessRenderer {
    async fn render(
        &self,
        area: &StagingArea,
        quality: Quality,
        cancel: &CancellationToken,
    ) -> Result<RenderResult, RenderError> {
        let args = self.command_args(area, quality);
        tracing::info!(
            program = %self.options.program,
            args = ?args,
            cwd = %area.path().display(),
            %quality,
            "invoking renderer"
        );

        let mut cmd = Command::new(&self.options.program);
        cmd.args(&args)
            .current_dir(area.path())
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| RenderError::Spawn {
            program: self.options.program.clone(),
            source,
        })?;

        // Dropping the wait future drops the child, which kills it.
        let limit = self.options.timeout();
        let wait = async move {
            let output = child.wait_with_output();
            match limit {
                Some(limit) => match tokio::time::timeout(limit, output).await {
                    Ok(result) => result.map_err(RenderError::Wait),
                    Err(_) => Err(RenderError::TimedOut { limit }),
                },
                None => output.await.map_err(RenderError::Wait),
            }
        };

        let output = tokio::select! {
            () = cancel.cancelled() => {
                tracing::warn!("render cancelled; killing renderer");
                return Err(RenderError::Cancelled);
            }
            output = wait => output?,
        };

        let result = RenderResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(stdout = %result.stdout, "renderer stdout");
        tracing::debug!(stderr = %result.stderr, "renderer stderr");
        tracing::info!(exit_code = result.exit_code, "renderer finished");

        if result.success() {
            Ok(result)
        } else {
            Err(RenderError::NonZeroExit {
                exit_code: result.exit_code,
                stderr: result.stderr,
            })
        }
    }
}
