//! Core kernel types
//!
//! - Request identifiers
//! - Quality tiers and their renderer flags
//! - Scene source, render results and artifacts

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use ulid::Ulid;

/// Unique request identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Generate new request ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render quality tier, trading render time for fidelity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Fast, low fidelity
    Low,
    /// Balanced
    #[default]
    Medium,
    /// Slow, high fidelity
    High,
}

impl Quality {
    /// All tiers, fastest first
    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Medium, Quality::High];

    /// Parse a user-supplied label.
    ///
    /// Total: anything unrecognised (including an empty label) is `Medium`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Quality::Low,
            "high" => Quality::High,
            _ => Quality::Medium,
        }
    }

    /// Same as [`Quality::from_label`] but for an optional label
    #[must_use]
    pub fn from_optional_label(label: Option<&str>) -> Self {
        label.map_or(Quality::Medium, Self::from_label)
    }

    /// Renderer command-line flag for this tier
    #[inline]
    #[must_use]
    pub fn render_flag(self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
        }
    }

    /// Lowercase label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Generated scene source, ready to be staged.
///
/// Never blank. Moved into the stager, so it is consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSource(String);

impl SceneSource {
    /// Wrap generated text; `None` if it is empty or whitespace only
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    /// Source text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of the top-level scene classes declared in the source.
    ///
    /// A renderable source declares exactly one.
    #[must_use]
    pub fn scene_definitions(&self) -> Vec<String> {
        scene_class_pattern()
            .captures_iter(&self.0)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Consume into the raw text
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

fn scene_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Unindented `class Name(...Scene...):` only; nested classes are not scenes.
        Regex::new(r"(?m)^class\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^)]*Scene[^)]*\)\s*:")
            .unwrap_or_else(|e| unreachable!("scene pattern is a valid regex: {e}"))
    })
}

/// Captured outcome of one render invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    /// Process exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl RenderResult {
    /// Whether the renderer reported success
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A final rendered video located inside a staging area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
    size_bytes: u64,
}

impl Artifact {
    /// Create an artifact record
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Absolute path of the video
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size at resolution time
    #[inline]
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
