//! Client configuration from the environment

use std::time::Duration;

/// Model used when `OPENAI_MODEL_NAME` is unset
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// API root used when `OPENAI_BASE_URL` is unset
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP timeout used when `OPENAI_REQUEST_TIMEOUT_SECS` is unset
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Client configuration errors
#[derive(Debug, thiserror::Error)]
pub enum LlmConfigError {
    /// No API key available
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// A variable has the wrong shape
    #[error("invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Connection settings for an OpenAI-compatible chat completions API
#[derive(Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// API root, without the trailing `/chat/completions`
    pub base_url: String,
    /// Whole-request HTTP timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Defaults with the given key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// With a model name
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With an API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL_NAME`, `OPENAI_BASE_URL` and
    /// `OPENAI_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, LlmConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`OpenAiConfig::from_env`] over an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_key = set("OPENAI_API_KEY").ok_or(LlmConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key.trim());

        if let Some(model) = set("OPENAI_MODEL_NAME") {
            config.model = model.trim().to_string();
        }
        if let Some(base_url) = set("OPENAI_BASE_URL") {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(value) = set("OPENAI_REQUEST_TIMEOUT_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| LlmConfigError::InvalidValue {
                    var: "OPENAI_REQUEST_TIMEOUT_SECS",
                    value,
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Chat completions endpoint
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
