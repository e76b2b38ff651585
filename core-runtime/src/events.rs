//! # Event Bus System
//!
//! The canonical event surface of the playback core, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Backends report lifecycle changes on individual sounds. Observers should not
//! have to know which backend is active, so the core republishes those reports
//! under fixed names, alongside the orchestrator's own notifications:
//!
//! - [`AudioEvent`]: lifecycle of the current sound (relayed from its backend)
//! - [`ServiceEvent`]: load requests, failures, current-sound switches, volume
//!
//! ```text
//! ┌──────────────┐  relay   ┌───────────┐   subscribe   ┌────────────┐
//! │ current sound├─────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘          │ EventBus  │               └────────────┘
//! ┌──────────────┐  emit    │           │   subscribe   ┌────────────┐
//! │ orchestrator ├─────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘          └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ServiceEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Service(ServiceEvent::VolumeChange { volume: 40 })).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.name(), "volume-change");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving. Position updates are frequent, so slow observers should filter.
//! - **`RecvError::Closed`**: the orchestrator was dropped.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Payload Types
// ============================================================================

/// Serializable snapshot identifying a sound in an event payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SoundRef {
    /// Stable identifier of the sound handle
    pub id: String,
    /// Canonical URL the sound was loaded from
    pub url: String,
    /// Name of the connection backing the sound
    pub connection: String,
}

/// One failed strategy attempt, as reported to observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    pub connection: String,
    pub url: String,
    pub message: String,
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Lifecycle events of the current sound
    Audio(AudioEvent),
    /// Orchestrator notifications
    Service(ServiceEvent),
}

impl CoreEvent {
    /// Canonical event name, e.g. `played` or `current-sound-changed`.
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::Audio(e) => e.name(),
            CoreEvent::Service(e) => e.name(),
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            CoreEvent::Audio(e) => e.description(),
            CoreEvent::Service(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Service(ServiceEvent::LoadError { .. }) => EventSeverity::Error,
            CoreEvent::Service(ServiceEvent::CurrentSoundInterrupted { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Service(ServiceEvent::CurrentSoundChanged { .. })
            | CoreEvent::Service(ServiceEvent::LoadSuccess { .. }) => EventSeverity::Info,
            CoreEvent::Audio(AudioEvent::Played { .. })
            | CoreEvent::Audio(AudioEvent::Ended { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The sound the event is about, when there is one.
    pub fn sound(&self) -> Option<&SoundRef> {
        match self {
            CoreEvent::Audio(e) => Some(e.sound()),
            CoreEvent::Service(ServiceEvent::CurrentSoundChanged { sound, .. })
            | CoreEvent::Service(ServiceEvent::CurrentSoundInterrupted { sound })
            | CoreEvent::Service(ServiceEvent::LoadSuccess { sound, .. }) => Some(sound),
            CoreEvent::Service(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Audio Events
// ============================================================================

/// Backend lifecycle events republished for the current sound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AudioEvent {
    Played {
        sound: SoundRef,
    },
    Paused {
        sound: SoundRef,
    },
    Ended {
        sound: SoundRef,
    },
    DurationChanged {
        sound: SoundRef,
        /// `None` for live streams with no known duration
        duration_ms: Option<u64>,
    },
    PositionChanged {
        sound: SoundRef,
        position_ms: u64,
    },
    Loaded {
        sound: SoundRef,
    },
    Loading {
        sound: SoundRef,
        percent_loaded: Option<f32>,
    },
    PositionWillChange {
        sound: SoundRef,
        from_ms: u64,
        to_ms: u64,
    },
    WillRewind {
        sound: SoundRef,
        from_ms: u64,
        to_ms: u64,
    },
    WillFastForward {
        sound: SoundRef,
        from_ms: u64,
        to_ms: u64,
    },
    MetadataChanged {
        sound: SoundRef,
        metadata: serde_json::Value,
    },
}

impl AudioEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AudioEvent::Played { .. } => "played",
            AudioEvent::Paused { .. } => "paused",
            AudioEvent::Ended { .. } => "ended",
            AudioEvent::DurationChanged { .. } => "duration-changed",
            AudioEvent::PositionChanged { .. } => "position-changed",
            AudioEvent::Loaded { .. } => "loaded",
            AudioEvent::Loading { .. } => "loading",
            AudioEvent::PositionWillChange { .. } => "position-will-change",
            AudioEvent::WillRewind { .. } => "will-rewind",
            AudioEvent::WillFastForward { .. } => "will-fast-forward",
            AudioEvent::MetadataChanged { .. } => "metadata-changed",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            AudioEvent::Played { .. } => "Sound started playing",
            AudioEvent::Paused { .. } => "Sound paused",
            AudioEvent::Ended { .. } => "Sound reached the end",
            AudioEvent::DurationChanged { .. } => "Sound duration changed",
            AudioEvent::PositionChanged { .. } => "Playback position changed",
            AudioEvent::Loaded { .. } => "Sound finished loading",
            AudioEvent::Loading { .. } => "Sound is loading",
            AudioEvent::PositionWillChange { .. } => "Playback position is about to change",
            AudioEvent::WillRewind { .. } => "Sound is about to rewind",
            AudioEvent::WillFastForward { .. } => "Sound is about to fast forward",
            AudioEvent::MetadataChanged { .. } => "Stream metadata changed",
        }
    }

    pub fn sound(&self) -> &SoundRef {
        match self {
            AudioEvent::Played { sound }
            | AudioEvent::Paused { sound }
            | AudioEvent::Ended { sound }
            | AudioEvent::DurationChanged { sound, .. }
            | AudioEvent::PositionChanged { sound, .. }
            | AudioEvent::Loaded { sound }
            | AudioEvent::Loading { sound, .. }
            | AudioEvent::PositionWillChange { sound, .. }
            | AudioEvent::WillRewind { sound, .. }
            | AudioEvent::WillFastForward { sound, .. }
            | AudioEvent::MetadataChanged { sound, .. } => sound,
        }
    }
}

// ============================================================================
// Service Events
// ============================================================================

/// Notifications emitted by the orchestrator itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServiceEvent {
    /// The current sound was replaced by another one that started playing.
    CurrentSoundChanged {
        sound: SoundRef,
        previous: Option<SoundRef>,
    },
    /// A playing sound lost its place to another sound.
    CurrentSoundInterrupted { sound: SoundRef },
    /// A load or play call was accepted. `urls` is `None` when the caller
    /// passed a deferred url list that has not resolved yet.
    NewLoadRequest {
        request_id: u64,
        urls: Option<Vec<String>>,
    },
    /// The url list resolved and strategies are about to be tried.
    PreLoad { urls: Vec<String> },
    /// Every strategy failed.
    #[serde(rename = "audio-load-error")]
    LoadError {
        urls: Vec<String>,
        failures: Vec<FailureRecord>,
        message: Option<String>,
    },
    /// A strategy produced a ready sound.
    LoadSuccess {
        sound: SoundRef,
        failures: Vec<FailureRecord>,
    },
    VolumeChange { volume: u8 },
}

impl ServiceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceEvent::CurrentSoundChanged { .. } => "current-sound-changed",
            ServiceEvent::CurrentSoundInterrupted { .. } => "current-sound-interrupted",
            ServiceEvent::NewLoadRequest { .. } => "new-load-request",
            ServiceEvent::PreLoad { .. } => "pre-load",
            ServiceEvent::LoadError { .. } => "audio-load-error",
            ServiceEvent::LoadSuccess { .. } => "load-success",
            ServiceEvent::VolumeChange { .. } => "volume-change",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ServiceEvent::CurrentSoundChanged { .. } => "Current sound changed",
            ServiceEvent::CurrentSoundInterrupted { .. } => "Current sound was interrupted",
            ServiceEvent::NewLoadRequest { .. } => "New load request received",
            ServiceEvent::PreLoad { .. } => "Urls resolved, loading",
            ServiceEvent::LoadError { .. } => "All strategies failed to load",
            ServiceEvent::LoadSuccess { .. } => "Sound loaded",
            ServiceEvent::VolumeChange { .. } => "System volume changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let switches = EventStream::new(bus.subscribe())
///     .filter(|event| event.name().starts_with("current-sound"));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every event currently buffered that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
