//! Per-user session file: conversation history, preferred quality and the
//! running animation count

use anyhow::Context;
use scenecast_core::kernel::Quality;
use scenecast_core::{ConversationHistory, Turn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Session {
    pub(crate) history: ConversationHistory,
    pub(crate) quality: Quality,
    pub(crate) animation_count: u64,
}

impl Session {
    /// Load `path`, or start fresh when it does not exist yet
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("session file {} is corrupt", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading session {}", path.display())),
        }
    }

    pub(crate) fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing session {}", path.display()))
    }

    /// Number the next delivered animation gets
    pub(crate) fn next_animation(&self) -> u64 {
        self.animation_count + 1
    }

    pub(crate) fn record_request(&mut self, description: &str) {
        self.history.push(Turn::user(description));
    }

    /// Count a delivered animation and answer in the history
    pub(crate) fn record_delivery(&mut self, description: &str) -> u64 {
        self.animation_count += 1;
        let n = self.animation_count;
        self.history
            .push(Turn::assistant(format!("Created animation #{n}: {description}")));
        n
    }
}
