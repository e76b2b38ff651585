//! Workspace facade crate.
//!
//! Re-exports the crates a host needs to embed the playback core, so it can
//! depend on `hifi-workspace` alone instead of wiring each crate individually.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{LoadOrchestrator, LoadOutcome, Sound, SoundOptions};
pub use core_runtime::config::CoreConfig;
