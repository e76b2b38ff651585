//! # Sound Acquisition
//!
//! Finds or builds one playable sound from a prioritized list of candidate
//! urls, using pluggable backend connections.
//!
//! ## Overview
//!
//! This crate handles:
//! - Planning (connection, url) attempts in a deterministic fallback order
//! - Racing each attempt's `ready` and `errored` reports
//! - Caching loaded sounds and recording failed attempts
//! - Keeping at most one sound playing at a time
//! - Relaying the current sound's lifecycle as canonical events
//! - Sampling the current sound's position in the background
//!
//! Concrete connections (native audio elements, web audio graphs...) live in
//! the host and plug in through [`Connection`] and [`SoundBackend`].

pub mod cache;
pub mod connection;
pub mod error;
pub mod locator;
pub mod one_at_a_time;
pub mod orchestrator;
pub mod outcome;
pub mod planner;
pub mod poller;
pub mod relay;
pub mod resolve;
pub mod sound;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{ErrorCache, ErrorRecord, SoundCache};
pub use connection::{ConnectionRegistry, RegisteredConnection};
pub use error::{PlaybackError, Result};
pub use locator::{SoundLocator, SoundUrl};
pub use one_at_a_time::OneAtATime;
pub use orchestrator::{LoadOrchestrator, LoadOrchestratorBuilder};
pub use outcome::{AttemptFailure, LoadFailure, LoadOutcome, SoundOptions};
pub use planner::{plan, AttemptDescriptor, PlanHints};
pub use poller::{PollOutcome, PositionPoller};
pub use relay::EventRelay;
pub use resolve::{DefaultUrlResolver, UrlInput, UrlResolver};
pub use sound::{
    ListenerId, ListenerPriority, Metadata, Sound, SoundEvent, SoundEventKind, SoundId,
    SoundReporter, SoundState, Subscription, WeakSound,
};
pub use traits::{Connection, CreateSound, SharedAudioToken, SoundBackend};
