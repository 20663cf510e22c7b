//! Core types and configuration for parlo.
//!
//! This crate provides platform-agnostic types that can be used across
//! all parlo sub-crates.

mod config;
mod event;
mod state;
mod transcript;

pub use config::{Config, ConfigManager};
pub use event::SessionEvent;
pub use state::RecorderState;
pub use transcript::{ItemId, Origin, PENDING_TEXT, Transcript, TranscriptItem};

/// Application name
pub const APP_NAME: &str = "parlo";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Parlo";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
