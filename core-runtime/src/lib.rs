//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback crates:
//! - Logging and tracing setup, with URL credential redaction
//! - Configuration (`PlaybackSettings` and the validated `CoreConfig`)
//! - The canonical event bus that observers subscribe to

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
