//! SceneCast LLM client
//!
//! [`OpenAiGenerator`] implements the pipeline's `CodeGenerator` boundary over
//! an OpenAI-compatible Chat Completions API.
//!
//! ```rust,ignore
//! let generator = scenecast_llm::OpenAiGenerator::from_env()?;
//! let pipeline = Pipeline::from_config(&config, Arc::new(generator));
//! ```

pub mod config;
pub mod openai;

pub use config::{LlmConfigError, OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use openai::OpenAiGenerator;
