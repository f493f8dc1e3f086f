//! # jobsight-inference
//!
//! AI classification of crawled job postings.
//!
//! This crate provides:
//! - An OpenAI-compatible chat completion classifier (Gemini's
//!   OpenAI-compatible endpoint by default)
//! - Batch prompt construction and tolerant response parsing
//! - A deterministic mock classifier (feature `mock`)
//!
//! # Feature Flags
//!
//! - `mock`: Enable [`mock::MockClassifier`] for dependent crates' tests
//!
//! # Example
//!
//! ```rust,no_run
//! use jobsight_inference::OpenAIClassifier;
//! use jobsight_core::Classifier;
//!
//! #[tokio::main]
//! async fn main() -> jobsight_core::Result<()> {
//!     let classifier = OpenAIClassifier::from_env()?;
//!     let enrichments = classifier.classify(&[]).await?;
//!     assert!(enrichments.is_empty());
//!     Ok(())
//! }
//! ```

pub mod openai;
pub mod prompts;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use openai::{OpenAIClassifier, OpenAIConfig};
