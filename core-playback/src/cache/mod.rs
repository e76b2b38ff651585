//! # Acquisition Caches
//!
//! Two in-memory caches keyed by normalized url (see [`SoundUrl::key`]):
//!
//! - [`SoundCache`]: one live [`Sound`] per key. A sound enters after a
//!   successful attempt and leaves when it is torn down.
//! - [`ErrorCache`]: the last failure per (key, connection). Consulted for
//!   diagnostics, never expired.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │       LoadOrchestrator       │
//! └──────┬───────────────┬───────┘
//!        │ hit / insert  │ record
//!        ▼               ▼
//!   SoundCache       ErrorCache
//!   key -> Sound     (key, connection) -> ErrorRecord
//! ```
//!
//! Neither cache persists across restarts.
//!
//! [`SoundUrl::key`]: crate::locator::SoundUrl::key
//! [`Sound`]: crate::sound::Sound

pub mod error_cache;
pub mod sound_cache;

pub use error_cache::{ErrorCache, ErrorRecord};
pub use sound_cache::SoundCache;
