//! # Connection Traits
//!
//! The two seams between the acquisition core and the code that actually
//! produces sound.
//!
//! - [`Connection`]: a named way of turning a url into a playable backend
//!   (a native audio element, a web-audio graph, a flash-era fallback, a
//!   platform player...). Connections are registered once and consulted for
//!   every load.
//! - [`SoundBackend`]: the per-sound object a connection returns. The core
//!   drives it with synchronous commands; the backend answers through the
//!   [`SoundReporter`] it was handed at creation.
//!
//! ## Threading Model
//!
//! Both traits require `Send + Sync`. Commands are issued from whichever task
//! currently owns the orchestrator call, never while an internal lock is held,
//! so a backend may report back into the sound from inside a command.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use core_playback::{Connection, CreateSound, Result, SoundBackend, SoundUrl};
//!
//! struct Silent;
//!
//! #[async_trait]
//! impl Connection for Silent {
//!     fn name(&self) -> &str {
//!         "Silent"
//!     }
//!
//!     fn can_play(&self, url: &SoundUrl) -> bool {
//!         url.extension().as_deref() == Some("wav")
//!     }
//!
//!     async fn create(&self, request: CreateSound) -> Result<Box<dyn SoundBackend>> {
//!         # unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::locator::SoundUrl;
use crate::sound::SoundReporter;

// ============================================================================
// Shared Audio
// ============================================================================

/// Identifies the single audio element shared by every sound on platforms
/// that only allow one (mobile browsers, some embedded hosts).
///
/// When present in a [`CreateSound`] request, the connection must reuse the
/// element named by the token instead of allocating a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedAudioToken(Uuid);

impl SharedAudioToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SharedAudioToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SharedAudioToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Everything a connection needs to build one sound.
#[derive(Debug, Clone)]
pub struct CreateSound {
    pub url: SoundUrl,
    /// Options the connection was registered with
    pub options: Option<Value>,
    /// Set when the sound must reuse the shared audio element
    pub shared_audio: Option<SharedAudioToken>,
    /// Where the backend reports lifecycle changes
    pub reporter: SoundReporter,
}

/// A named strategy for producing sounds.
///
/// `create` returns once the backend exists; readiness is reported later
/// through the reporter (`ready` or `errored`). Returning `Err` counts as an
/// immediate failure of the attempt.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Name the connection is registered and referred to by.
    fn name(&self) -> &str;

    /// Whether this connection can attempt `url` at all.
    fn can_play(&self, url: &SoundUrl) -> bool;

    /// Validates the options the connection was configured with.
    /// Called once on activation, with `{}` when none were configured.
    fn setup(&self, _options: &Value) -> Result<()> {
        Ok(())
    }

    async fn create(&self, request: CreateSound) -> Result<Box<dyn SoundBackend>>;
}

// ============================================================================
// Backend
// ============================================================================

/// Per-sound playback engine returned by a [`Connection`].
///
/// Commands return immediately; their effect is reported asynchronously
/// (`played`, `paused`, `position_changed`...). A backend that reports
/// synchronously from inside a command is also valid.
pub trait SoundBackend: Send + Sync {
    /// Starts playback, seeking to `position` first when given.
    fn play(&self, position: Option<Duration>);

    fn pause(&self);

    /// Stops playback and rewinds. Reported as `paused`.
    fn stop(&self);

    fn seek(&self, position: Duration);

    /// Volume between 0 and 100.
    fn set_volume(&self, volume: u8);

    /// Reads the playhead. May fail while the media is still being probed.
    fn current_position(&self) -> Result<Duration>;

    /// Live streams cannot seek and have no duration.
    fn is_stream(&self) -> bool {
        false
    }

    /// Releases the underlying resources. Called once, after `Teardown`.
    fn teardown(&self) {}
}
