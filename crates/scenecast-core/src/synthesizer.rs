//! Scene Synthesizer
//!
//! Turns a description plus recent conversation into scene source by asking
//! the code-generation service, then cleans up the reply.

use crate::error::GenerationError;
use crate::types::{ConversationHistory, Role, MAX_CONTEXT_TURNS};
use scenecast_kernel::SceneSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sampling temperature for scene generation.
///
/// Low enough for structurally consistent code, high enough for variety.
pub const TEMPERATURE: f32 = 0.5;

/// Upper bound on generated tokens
pub const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Default deadline for one generation call
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed system instruction
pub const SYSTEM_PROMPT: &str = "You are an expert Manim animation developer. \
Write Python code for a Manim animation that matches the user's description.

Requirements:
1. Import only from the manim library (`from manim import *`)
2. Define exactly one Scene subclass with a construct method
3. Keep the animation simple but engaging
4. Use fitting colors, timing and effects, with waits between steps
5. The code must be complete and runnable as-is
6. Take the earlier conversation into account when the user refers to it

Useful building blocks:
- Circle(), Square(), Rectangle(), Triangle(), Dot(), Line(), Arrow()
- Text(), MathTex(), Tex()
- Create(), Write(), Transform(), FadeIn(), FadeOut()
- UP, DOWN, LEFT, RIGHT, ORIGIN
- RED, BLUE, GREEN, YELLOW, WHITE, BLACK

Return only the Python code, no explanations.";

/// Chat message sent to the code-generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Message with a conversation role
    #[must_use]
    pub fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
        }
    }
}

/// Generation parameters; fixed for every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Output token bound
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// Code-generation service boundary
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Complete the conversation, returning the raw reply text
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, GenerationError>;
}

/// Builds context, calls the generator and post-processes the reply
#[derive(Clone)]
pub struct SceneSynthesizer {
    generator: Arc<dyn CodeGenerator>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for SceneSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneSynthesizer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SceneSynthesizer {
    /// Create with the default timeout
    #[must_use]
    pub fn new(generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            generator,
            timeout: Some(DEFAULT_GENERATION_TIMEOUT),
        }
    }

    /// With a generation deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Let generation calls run until they finish or are cancelled
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Produce scene source for `description`.
    ///
    /// # Errors
    /// `GenerationError` if the description is blank, the service fails or
    /// times out, or the reply is empty once fences are stripped. Never retries.
    pub async fn synthesize(
        &self,
        description: &str,
        history: &ConversationHistory,
        cancel: &CancellationToken,
    ) -> Result<SceneSource, GenerationError> {
        if description.trim().is_empty() {
            return Err(GenerationError::EmptyDescription);
        }

        let messages = build_context(description, history);
        tracing::debug!(messages = messages.len(), "requesting scene source");

        let call = self.generator.generate(&messages, GenerationParams::default());
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .map_err(|_| GenerationError::TimedOut(limit))?,
                None => call.await,
            }
        };
        let raw = tokio::select! {
            () = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = bounded => result?,
        };

        let source = SceneSource::new(strip_code_fences(&raw)).ok_or(GenerationError::Empty)?;

        let scenes = source.scene_definitions();
        if scenes.len() == 1 {
            tracing::info!(scene = %scenes[0], "synthesized scene source");
        } else {
            tracing::warn!(count = scenes.len(), ?scenes, "scene source should define exactly one scene");
        }
        Ok(source)
    }
}

/// System instruction, the last [`MAX_CONTEXT_TURNS`] turns, then the request
#[must_use]
pub fn build_context(description: &str, history: &ConversationHistory) -> Vec<ChatMessage> {
    let recent = history.recent(MAX_CONTEXT_TURNS);
    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(
        recent
            .iter()
            .map(|turn| ChatMessage::with_role(turn.role, turn.content.clone())),
    );
    messages.push(ChatMessage::with_role(
        Role::User,
        format!("Create a Manim animation for: {description}"),
    ));
    messages
}

/// Strip a surrounding Markdown code fence and whitespace.
///
/// Handles tagged (```` ```python ````) and untagged fences; a missing
/// closing fence is tolerated.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag, if any, up to the end of the fence line.
        text = match rest.find('\n') {
            Some(newline) if !rest[..newline].trim().contains(' ') => &rest[newline + 1..],
            Some(_) => rest,
            None => rest.strip_prefix("python").unwrap_or(rest),
        };
        text = text.trim_end();
        if let Some(body) = text.strip_suffix("```") {
            text = body;
        }
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Turn;
    use proptest::prelude::*;

    const SCENE: &str = "from manim import *\n\nclass CircleToSquare(Scene):\n    def construct(self):\n        self.play(Transform(Circle(), Square()))";

    fn synthesizer(mock: MockCodeGenerator) -> SceneSynthesizer {
        SceneSynthesizer::new(Arc::new(mock))
    }

    #[test]
    fn strips_language_tagged_fence() {
        let raw = format!("```python\n{SCENE}\n```");
        assert_eq!(strip_code_fences(&raw), SCENE);
    }

    #[test]
    fn strips_untagged_fence() {
        let raw = format!("  ```\n{SCENE}\n```  \n");
        assert_eq!(strip_code_fences(&raw), SCENE);
    }

    #[test]
    fn tolerates_missing_closing_fence() {
        let raw = format!("```py\n{SCENE}\n");
        assert_eq!(strip_code_fences(&raw), SCENE);
    }

    #[test]
    fn leaves_unfenced_code_alone() {
        assert_eq!(strip_code_fences(&format!("\n{SCENE}\n\n")), SCENE);
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(strip_code_fences("```print(1)```"), "print(1)");
    }

    #[test]
    fn fence_only_reply_is_empty() {
        assert_eq!(strip_code_fences("```python\n```"), "");
        assert_eq!(strip_code_fences("``````"), "");
    }

    proptest! {
        #[test]
        fn stripping_is_idempotent(body in "[a-z =()\n]{0,40}") {
            let once = strip_code_fences(&body).to_string();
            prop_assert_eq!(strip_code_fences(&once), once.as_str());
        }
    }

    #[test]
    fn context_is_bounded_and_chronological() {
        let mut history = ConversationHistory::new();
        for i in 0..12 {
            history.push(Turn::user(format!("ask {i}")));
            history.push(Turn::assistant(format!("Created animation #{i}")));
        }

        let messages = build_context("a spinning cube", &history);
        assert_eq!(messages.len(), 1 + MAX_CONTEXT_TURNS + 1);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "ask 7");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[10].content, "Created animation #11");
        assert_eq!(
            messages.last().unwrap().content,
            "Create a Manim animation for: a spinning cube"
        );
    }

    #[test]
    fn context_with_empty_history() {
        let messages = build_context("a dot", &ConversationHistory::new());
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn synthesize_uses_fixed_params_and_strips_fences() {
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate()
            .withf(|messages, params| {
                messages.len() == 2
                    && params.temperature == TEMPERATURE
                    && params.max_tokens == MAX_OUTPUT_TOKENS
            })
            .times(1)
            .returning(|_, _| Ok(format!("```python\n{SCENE}\n```")));

        let source = synthesizer(mock)
            .synthesize("a circle turning into a square", &ConversationHistory::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(source.as_str(), SCENE);
        assert_eq!(source.scene_definitions(), vec!["CircleToSquare".to_string()]);
    }

    #[tokio::test]
    async fn whitespace_reply_is_a_generation_error() {
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate()
            .returning(|_, _| Ok("```python\n   \n```".to_string()));

        let err = synthesizer(mock)
            .synthesize("anything", &ConversationHistory::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Empty);
    }

    #[tokio::test]
    async fn service_failure_is_passed_through_without_retry() {
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Err(GenerationError::service("upstream 500", true)));

        let err = synthesizer(mock)
            .synthesize("anything", &ConversationHistory::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Service { .. }));
    }

    #[tokio::test]
    async fn blank_description_never_calls_the_service() {
        let mut mock = MockCodeGenerator::new();
        mock.expect_generate().never();

        let err = synthesizer(mock)
            .synthesize("   ", &ConversationHistory::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::EmptyDescription);
    }

    struct SlowGenerator;

    #[async_trait::async_trait]
    impl CodeGenerator for SlowGenerator {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _params: GenerationParams,
        ) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(SCENE.to_string())
        }
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let synth = SceneSynthesizer::new(Arc::new(SlowGenerator)).with_timeout(Duration::from_millis(50));

        let err = synth
            .synthesize("anything", &ConversationHistory::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::TimedOut(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn unbounded_generation_still_honours_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = SceneSynthesizer::new(Arc::new(SlowGenerator))
            .without_timeout()
            .synthesize("anything", &ConversationHistory::new(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_token_stops_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = SceneSynthesizer::new(Arc::new(SlowGenerator))
            .synthesize("anything", &ConversationHistory::new(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Cancelled);
    }
}
