//! # jobsight-core
//!
//! Core types, traits, and abstractions for jobsight.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the store, inference, sync and API crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod pacing;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{ChangeFeed, ChangeSubscription, SubscriptionSender};
pub use models::*;
pub use pacing::Pacer;
pub use traits::*;
