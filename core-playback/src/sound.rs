//! # Sound Handles
//!
//! A [`Sound`] is the playable handle produced by one connection for one url.
//! It is cheap to clone (all clones share state) and compares by identity.
//!
//! ## Lifecycle
//!
//! ```text
//! Loading ──ready──> Ready ──played──> Playing <──> Paused
//!    │                 │                  │
//!    └────errored──────┴──────errored─────┴──ended──> Ended
//! ```
//!
//! The lifecycle state lives in a `watch` channel, which is the single source
//! of truth for `is_playing` and lets async code wait on transitions.
//!
//! ## Reporting
//!
//! Backends never touch the handle directly. They receive a [`SoundReporter`]
//! (a weak reference) and call it whenever something happens. Each report
//! updates the handle's status and then notifies listeners synchronously, in
//! priority order and then registration order. Listeners are invoked without
//! any internal lock held, so a listener may call back into the handle (or
//! another handle) freely.

use bridge_traits::platform::PlatformSendSync;
use core_async::sync::watch;
use core_runtime::events::SoundRef;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{PlaybackError, Result};
use crate::locator::SoundUrl;
use crate::traits::SoundBackend;

/// Free-form metadata attached to a sound (title, artist, artwork...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Stable identity of a sound handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundId(Uuid);

impl SoundId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundState {
    Loading,
    Ready,
    Playing,
    Paused,
    Errored,
    Ended,
}

impl SoundState {
    /// Whether the sound got past loading successfully.
    pub fn is_loaded(&self) -> bool {
        !matches!(self, SoundState::Loading | SoundState::Errored)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Something a backend reported about a sound, or a notice the handle emits
/// before it changes position.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundEvent {
    Ready,
    Errored { message: String },
    Played,
    Paused,
    Ended,
    DurationChanged(Option<Duration>),
    PositionChanged(Duration),
    Loaded,
    Loading { percent_loaded: Option<f32> },
    PositionWillChange { from: Duration, to: Duration },
    WillRewind { from: Duration, to: Duration },
    WillFastForward { from: Duration, to: Duration },
    MetadataChanged(Metadata),
    /// The handle is being destroyed; listeners are released afterwards.
    Teardown,
}

impl SoundEvent {
    pub fn kind(&self) -> SoundEventKind {
        match self {
            SoundEvent::Ready => SoundEventKind::Ready,
            SoundEvent::Errored { .. } => SoundEventKind::Errored,
            SoundEvent::Played => SoundEventKind::Played,
            SoundEvent::Paused => SoundEventKind::Paused,
            SoundEvent::Ended => SoundEventKind::Ended,
            SoundEvent::DurationChanged(_) => SoundEventKind::DurationChanged,
            SoundEvent::PositionChanged(_) => SoundEventKind::PositionChanged,
            SoundEvent::Loaded => SoundEventKind::Loaded,
            SoundEvent::Loading { .. } => SoundEventKind::Loading,
            SoundEvent::PositionWillChange { .. } => SoundEventKind::PositionWillChange,
            SoundEvent::WillRewind { .. } => SoundEventKind::WillRewind,
            SoundEvent::WillFastForward { .. } => SoundEventKind::WillFastForward,
            SoundEvent::MetadataChanged(_) => SoundEventKind::MetadataChanged,
            SoundEvent::Teardown => SoundEventKind::Teardown,
        }
    }
}

/// Discriminant of [`SoundEvent`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEventKind {
    Ready,
    Errored,
    Played,
    Paused,
    Ended,
    DurationChanged,
    PositionChanged,
    Loaded,
    Loading,
    PositionWillChange,
    WillRewind,
    WillFastForward,
    MetadataChanged,
    Teardown,
}

// ============================================================================
// Listeners
// ============================================================================

/// Callback invoked synchronously when a sound emits an event.
pub type SoundListener = Arc<dyn Fn(&Sound, &SoundEvent) + Send + Sync>;

/// Listeners with [`Exclusive`](ListenerPriority::Exclusive) priority run
/// before every [`Normal`](ListenerPriority::Normal) listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Exclusive,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    kind: SoundEventKind,
    priority: ListenerPriority,
    callback: SoundListener,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

/// Removes its listener when dropped.
#[must_use = "dropping a Subscription removes the listener immediately"]
pub struct Subscription {
    sound: WeakSound,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn sound_id(&self) -> SoundId {
        self.sound.id()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(sound) = self.sound.upgrade() {
            sound.off(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("sound", &self.sound.id())
            .field("id", &self.id)
            .finish()
    }
}

// ============================================================================
// Sound
// ============================================================================

#[derive(Debug, Clone, Default)]
struct SoundStatus {
    position: Duration,
    duration: Option<Duration>,
    volume: u8,
    percent_loaded: Option<f32>,
    metadata: Metadata,
    stream_metadata: Metadata,
    error: Option<String>,
    torn_down: bool,
}

struct SoundInner {
    id: SoundId,
    url: SoundUrl,
    connection: String,
    state: watch::Sender<SoundState>,
    status: Mutex<SoundStatus>,
    listeners: Mutex<ListenerTable>,
    backend: OnceLock<Box<dyn SoundBackend>>,
}

/// Playable handle backed by one connection.
#[derive(Clone)]
pub struct Sound {
    inner: Arc<SoundInner>,
}

impl Sound {
    pub(crate) fn new(url: SoundUrl, connection: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SoundState::Loading);
        let status = SoundStatus {
            volume: 100,
            ..SoundStatus::default()
        };
        Self {
            inner: Arc::new(SoundInner {
                id: SoundId::new(),
                url,
                connection: connection.into(),
                state,
                status: Mutex::new(status),
                listeners: Mutex::new(ListenerTable::default()),
                backend: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn attach_backend(&self, backend: Box<dyn SoundBackend>) -> Result<()> {
        self.inner
            .backend
            .set(backend)
            .map_err(|_| PlaybackError::Internal(format!("sound {} already has a backend", self.id())))
    }

    fn backend(&self) -> Option<&dyn SoundBackend> {
        self.inner.backend.get().map(|backend| backend.as_ref())
    }

    /// Handle given to the backend for reporting lifecycle changes.
    pub fn reporter(&self) -> SoundReporter {
        SoundReporter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn downgrade(&self) -> WeakSound {
        WeakSound {
            inner: Arc::downgrade(&self.inner),
            id: self.inner.id,
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn id(&self) -> SoundId {
        self.inner.id
    }

    pub fn url(&self) -> &SoundUrl {
        &self.inner.url
    }

    /// Name of the connection that created this sound.
    pub fn connection(&self) -> &str {
        &self.inner.connection
    }

    pub fn state(&self) -> SoundState {
        *self.inner.state.borrow()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SoundState::Playing
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    pub fn is_errored(&self) -> bool {
        self.state() == SoundState::Errored
    }

    pub fn position(&self) -> Duration {
        self.inner.status.lock().position
    }

    /// `None` until the backend reports a duration, and for live streams.
    pub fn duration(&self) -> Option<Duration> {
        self.inner.status.lock().duration
    }

    pub fn volume(&self) -> u8 {
        self.inner.status.lock().volume
    }

    /// Percentage (0-100) of the media buffered, when the backend reports it.
    pub fn percent_loaded(&self) -> Option<f32> {
        self.inner.status.lock().percent_loaded
    }

    /// Metadata supplied by the caller when the sound was loaded.
    pub fn metadata(&self) -> Metadata {
        self.inner.status.lock().metadata.clone()
    }

    /// Metadata reported by the stream itself (e.g. ICY titles).
    pub fn stream_metadata(&self) -> Metadata {
        self.inner.status.lock().stream_metadata.clone()
    }

    /// Last error reported by the backend.
    pub fn error(&self) -> Option<String> {
        self.inner.status.lock().error.clone()
    }

    pub fn is_stream(&self) -> bool {
        self.backend().map_or(false, |backend| backend.is_stream())
    }

    pub fn is_fast_forwardable(&self) -> bool {
        !self.is_stream()
    }

    pub fn is_rewindable(&self) -> bool {
        !self.is_stream()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.status.lock().torn_down
    }

    /// Serializable snapshot used in event payloads.
    pub fn to_ref(&self) -> SoundRef {
        SoundRef {
            id: self.id().to_string(),
            url: self.url().to_string(),
            connection: self.connection().to_string(),
        }
    }

    /// Receiver that observes every lifecycle transition.
    pub fn watch_state(&self) -> watch::Receiver<SoundState> {
        self.inner.state.subscribe()
    }

    /// Waits until the lifecycle state satisfies `predicate`, returning the
    /// matching state. Resolves immediately when it already does.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> SoundState
    where
        F: FnMut(SoundState) -> bool,
    {
        let mut receiver = self.watch_state();
        let matched = match receiver.wait_for(|state| predicate(*state)).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        matched
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Registers a normal-priority listener for one kind of event.
    pub fn on<F>(&self, kind: SoundEventKind, callback: F) -> ListenerId
    where
        F: Fn(&Sound, &SoundEvent) + Send + Sync + 'static,
    {
        self.add_listener(kind, ListenerPriority::Normal, Arc::new(callback))
    }

    /// Registers a listener that runs before every normal listener.
    pub fn on_exclusive<F>(&self, kind: SoundEventKind, callback: F) -> ListenerId
    where
        F: Fn(&Sound, &SoundEvent) + Send + Sync + 'static,
    {
        self.add_listener(kind, ListenerPriority::Exclusive, Arc::new(callback))
    }

    /// Like [`on`](Self::on), but the listener lives as long as the returned
    /// [`Subscription`].
    pub fn subscribe<F>(&self, kind: SoundEventKind, callback: F) -> Subscription
    where
        F: Fn(&Sound, &SoundEvent) + Send + Sync + 'static,
    {
        let id = self.on(kind, callback);
        Subscription {
            sound: self.downgrade(),
            id,
        }
    }

    /// Like [`on_exclusive`](Self::on_exclusive), scoped to a [`Subscription`].
    pub fn subscribe_exclusive<F>(&self, kind: SoundEventKind, callback: F) -> Subscription
    where
        F: Fn(&Sound, &SoundEvent) + Send + Sync + 'static,
    {
        let id = self.on_exclusive(kind, callback);
        Subscription {
            sound: self.downgrade(),
            id,
        }
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut table = self.inner.listeners.lock();
        let before = table.entries.len();
        table.entries.retain(|entry| entry.id != id);
        table.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    fn add_listener(
        &self,
        kind: SoundEventKind,
        priority: ListenerPriority,
        callback: SoundListener,
    ) -> ListenerId {
        let torn_down = self.is_torn_down();
        let mut table = self.inner.listeners.lock();
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        if !torn_down {
            table.entries.push(ListenerEntry {
                id,
                kind,
                priority,
                callback,
            });
        }
        id
    }

    fn emit(&self, event: &SoundEvent) {
        let kind = event.kind();
        let callbacks: Vec<SoundListener> = {
            let table = self.inner.listeners.lock();
            let mut matching: Vec<&ListenerEntry> =
                table.entries.iter().filter(|entry| entry.kind == kind).collect();
            matching.sort_by_key(|entry| entry.priority);
            matching
                .into_iter()
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        trace!(sound = %self.id(), ?kind, listeners = callbacks.len(), "emit");
        for callback in callbacks {
            callback(self, event);
        }
    }

    /// Applies a backend report to the status and notifies listeners.
    fn apply(&self, event: SoundEvent) {
        {
            let mut status = self.inner.status.lock();
            if status.torn_down {
                return;
            }
            match &event {
                SoundEvent::Errored { message } => status.error = Some(message.clone()),
                SoundEvent::DurationChanged(duration) => status.duration = *duration,
                SoundEvent::PositionChanged(position) => status.position = *position,
                SoundEvent::Loading { percent_loaded } => status.percent_loaded = *percent_loaded,
                SoundEvent::Loaded => status.percent_loaded = Some(100.0),
                SoundEvent::MetadataChanged(metadata) => {
                    for (key, value) in metadata {
                        status.stream_metadata.insert(key.clone(), value.clone());
                    }
                }
                _ => {}
            }
        }

        if let Some(next) = self.next_state(&event) {
            self.inner.state.send_replace(next);
        }

        self.emit(&event);
    }

    fn next_state(&self, event: &SoundEvent) -> Option<SoundState> {
        match event {
            SoundEvent::Ready if self.state() == SoundState::Loading => Some(SoundState::Ready),
            SoundEvent::Errored { .. } => Some(SoundState::Errored),
            SoundEvent::Played => Some(SoundState::Playing),
            SoundEvent::Paused => Some(SoundState::Paused),
            SoundEvent::Ended => Some(SoundState::Ended),
            _ => None,
        }
    }

    /// Emits a notice that is not a backend report (position-will-change and
    /// friends). Dropped once the sound is torn down.
    fn notify(&self, event: SoundEvent) {
        if self.is_torn_down() {
            return;
        }
        self.emit(&event);
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn play(&self) {
        self.play_from(None);
    }

    /// Starts playback, optionally seeking first. The backend reports
    /// `Played` once audio is actually running.
    pub fn play_from(&self, position: Option<Duration>) {
        match self.backend() {
            Some(backend) => {
                debug!(sound = %self.id(), connection = self.connection(), "play");
                backend.play(position);
            }
            None => debug!(sound = %self.id(), "play ignored: no backend attached"),
        }
    }

    /// Pauses playback. The state leaves `Playing` immediately; the
    /// `Paused` event follows when the backend reports it.
    pub fn pause(&self) {
        if let Some(backend) = self.backend() {
            debug!(sound = %self.id(), "pause");
            self.leave_playing();
            backend.pause();
        }
    }

    pub fn stop(&self) {
        if let Some(backend) = self.backend() {
            debug!(sound = %self.id(), "stop");
            self.leave_playing();
            backend.stop();
        }
    }

    fn leave_playing(&self) {
        if self.is_torn_down() {
            return;
        }
        self.inner.state.send_if_modified(|state| {
            if *state == SoundState::Playing {
                *state = SoundState::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Seeks to `to`, clamped to the known duration.
    pub fn set_position(&self, to: Duration) {
        let from = self.position();
        let to = self.clamp(to);
        self.seek(from, to);
    }

    pub fn fast_forward(&self, by: Duration) {
        let from = self.position();
        let to = self.clamp(from.saturating_add(by));
        self.notify(SoundEvent::WillFastForward { from, to });
        self.seek(from, to);
    }

    pub fn rewind(&self, by: Duration) {
        let from = self.position();
        let to = from.saturating_sub(by);
        self.notify(SoundEvent::WillRewind { from, to });
        self.seek(from, to);
    }

    fn clamp(&self, position: Duration) -> Duration {
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn seek(&self, from: Duration, to: Duration) {
        let Some(backend) = self.backend() else {
            return;
        };
        self.notify(SoundEvent::PositionWillChange { from, to });
        backend.seek(to);
        self.inner.status.lock().position = to;
    }

    /// Applies a volume between 0 and 100; larger values are clamped.
    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.inner.status.lock().volume = volume;
        if let Some(backend) = self.backend() {
            backend.set_volume(volume);
        }
    }

    pub(crate) fn set_metadata(&self, metadata: Metadata) {
        self.inner.status.lock().metadata = metadata;
    }

    /// Asks the backend for its current position and records it.
    pub(crate) fn sample_position(&self) -> Result<Duration> {
        let backend = self
            .backend()
            .ok_or_else(|| PlaybackError::Internal(format!("sound {} has no backend", self.id())))?;
        let position = backend.current_position()?;
        self.inner.status.lock().position = position;
        Ok(position)
    }

    /// Tears the sound down: emits `Teardown`, releases every listener and
    /// lets the backend free its resources. Idempotent.
    pub fn destroy(&self) {
        {
            let mut status = self.inner.status.lock();
            if status.torn_down {
                return;
            }
            status.torn_down = true;
        }

        debug!(sound = %self.id(), url = %self.url(), "destroying sound");
        self.emit(&SoundEvent::Teardown);
        self.inner.listeners.lock().entries.clear();
        if let Some(backend) = self.backend() {
            backend.teardown();
        }
    }
}

impl PartialEq for Sound {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Sound {}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.id())
            .field("url", &self.url().as_str())
            .field("connection", &self.connection())
            .field("state", &self.state())
            .finish()
    }
}

/// Non-owning reference to a [`Sound`].
#[derive(Clone)]
pub struct WeakSound {
    inner: Weak<SoundInner>,
    id: SoundId,
}

impl WeakSound {
    pub fn upgrade(&self) -> Option<Sound> {
        self.inner.upgrade().map(|inner| Sound { inner })
    }

    pub fn id(&self) -> SoundId {
        self.id
    }
}

impl fmt::Debug for WeakSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakSound").field(&self.id).finish()
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Backend-side handle for reporting lifecycle changes on a sound.
///
/// Holds only a weak reference: reports after the sound was dropped or torn
/// down are ignored.
#[derive(Clone)]
pub struct SoundReporter {
    inner: Weak<SoundInner>,
}

impl SoundReporter {
    pub fn report(&self, event: SoundEvent) {
        if matches!(event, SoundEvent::Teardown) {
            if let Some(inner) = self.inner.upgrade() {
                Sound { inner }.destroy();
            }
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            Sound { inner }.apply(event);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner
            .upgrade()
            .map_or(false, |inner| !inner.status.lock().torn_down)
    }

    pub fn ready(&self) {
        self.report(SoundEvent::Ready);
    }

    pub fn errored(&self, message: impl Into<String>) {
        self.report(SoundEvent::Errored {
            message: message.into(),
        });
    }

    pub fn played(&self) {
        self.report(SoundEvent::Played);
    }

    pub fn paused(&self) {
        self.report(SoundEvent::Paused);
    }

    pub fn ended(&self) {
        self.report(SoundEvent::Ended);
    }

    pub fn duration_changed(&self, duration: Option<Duration>) {
        self.report(SoundEvent::DurationChanged(duration));
    }

    pub fn position_changed(&self, position: Duration) {
        self.report(SoundEvent::PositionChanged(position));
    }

    pub fn loading(&self, percent_loaded: Option<f32>) {
        self.report(SoundEvent::Loading { percent_loaded });
    }

    pub fn loaded(&self) {
        self.report(SoundEvent::Loaded);
    }

    pub fn metadata_changed(&self, metadata: Metadata) {
        self.report(SoundEvent::MetadataChanged(metadata));
    }
}

impl fmt::Debug for SoundReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundReporter")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// Sounds cross task boundaries inside the orchestrator.
const _: fn() = || {
    fn assert_send_sync<T: PlatformSendSync>() {}
    assert_send_sync::<Sound>();
    assert_send_sync::<SoundReporter>();
};
