//! Polytrack Core Library
//!
//! Domain models, error types, configuration, and language-tag helpers shared
//! across all Polytrack components.

pub mod config;
pub mod error;
pub mod lang;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use lang::language_display_name;
pub use models::{AudioTrack, TranscodeStatus, Video};
