//! OpenAI-compatible classifier backend.
//!
//! Works with any endpoint that speaks the chat completions API, including
//! Gemini's OpenAI-compatible surface (the default), OpenAI, and local
//! servers such as Ollama or vLLM.
//!
//! # Example
//!
//! ```rust,no_run
//! use jobsight_inference::openai::{OpenAIClassifier, OpenAIConfig};
//!
//! # fn main() -> jobsight_core::Result<()> {
//! // From environment variables (CLASSIFIER_API_KEY is required)
//! let classifier = OpenAIClassifier::from_env()?;
//!
//! // Or against a local endpoint
//! let config = OpenAIConfig::new("unused")
//!     .with_base_url("http://localhost:11434/v1")
//!     .with_model("llama3");
//! let local = OpenAIClassifier::new(config)?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIClassifier, OpenAIConfig};
pub use error::{to_jobsight_error, OpenAIErrorCode};
pub use types::*;
