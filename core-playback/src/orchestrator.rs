//! # Load Orchestrator
//!
//! Finds or builds a playable [`Sound`] for a list of candidate urls and owns
//! everything that has to stay consistent around it: the caches, the
//! single-playback guard, the current sound and the event surface.
//!
//! ## Overview
//!
//! - Resolves the caller's url input (one locator, many, or a deferred list)
//! - Returns a cached sound when one of the urls was loaded before
//! - Plans (connection, url) attempts and runs them one after another until a
//!   sound reports ready
//! - Records every failed attempt in the [`ErrorCache`]
//! - Tracks the current sound, publishes canonical events and samples the
//!   playhead in the background
//!
//! ## Workflow
//!
//! ### load
//! 1. Publish `new-load-request`
//! 2. Wait for a load slot (FIFO, bounded by `max_concurrent_loads`)
//! 3. Resolve the urls and publish `pre-load`
//! 4. Return the first cache hit, if any
//! 5. Plan attempts; for each one create a sound, wait for `ready` or
//!    `errored`, and record failures
//! 6. On success cache the sound, register it for single playback and publish
//!    `load-success`; otherwise publish `audio-load-error`
//!
//! ### play
//! Interrupts and pauses whatever is playing, loads, starts playback and waits
//! until the sound plays (or errors). A newer `play` cancels the one in
//! flight, which then resolves to [`LoadOutcome::Cancelled`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{LoadOrchestrator, SoundOptions};
//! use core_runtime::config::CoreConfig;
//!
//! # async fn example(native: std::sync::Arc<dyn core_playback::Connection>) -> core_playback::Result<()> {
//! let orchestrator = LoadOrchestrator::builder(CoreConfig::default())
//!     .connection(native)
//!     .build()?;
//!
//! let outcome = orchestrator
//!     .play(vec!["/song.ogg", "/song.mp3"], SoundOptions::default())
//!     .await?;
//! if let Some(sound) = outcome.sound() {
//!     println!("playing {} via {}", sound.url(), sound.connection());
//! }
//! # Ok(())
//! # }
//! ```

use bridge_traits::device::DeviceHintProvider;
use core_async::sync::{oneshot, CancellationToken, Semaphore};
use core_runtime::config::{ConnectionSettings, CoreConfig, PlaybackSettings, NATIVE_CONNECTION};
use core_runtime::events::{CoreEvent, EventBus, EventStream, FailureRecord, ServiceEvent};
use core_runtime::logging::redact_url;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ErrorCache, SoundCache};
use crate::connection::ConnectionRegistry;
use crate::error::{PlaybackError, Result};
use crate::one_at_a_time::OneAtATime;
use crate::outcome::{failure_message, AttemptFailure, LoadFailure, LoadOutcome, SoundOptions};
use crate::planner::{self, AttemptDescriptor, PlanHints};
use crate::poller::PositionPoller;
use crate::relay::EventRelay;
use crate::resolve::{DefaultUrlResolver, UrlInput, UrlResolver};
use crate::sound::{Metadata, Sound, SoundEvent, SoundEventKind, SoundState};
use crate::traits::{Connection, CreateSound, SharedAudioToken};

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`LoadOrchestrator`].
pub struct LoadOrchestratorBuilder {
    config: CoreConfig,
    catalog: Vec<Arc<dyn Connection>>,
    resolver: Option<Arc<dyn UrlResolver>>,
}

impl LoadOrchestratorBuilder {
    /// Adds a connection implementation to the catalog. Only connections
    /// named in the settings are activated.
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.catalog.push(connection);
        self
    }

    pub fn connections<I>(mut self, connections: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Connection>>,
    {
        self.catalog.extend(connections);
        self
    }

    /// Replaces the default resolver (locators joined against `base_url`).
    pub fn resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Validates the configuration, activates the configured connections and
    /// starts the background tasks.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Config`] when the settings are invalid
    /// - [`PlaybackError::UnknownConnection`] when a configured name is not in
    ///   the catalog
    /// - [`PlaybackError::ConnectionSetup`] when a connection rejects its options
    pub fn build(self) -> Result<LoadOrchestrator> {
        self.config.validate()?;
        let settings = self.config.settings.clone();
        let base = settings.base()?;

        let registry = ConnectionRegistry::activate(&self.catalog, &settings.connections)?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(DefaultUrlResolver::new(base)));

        let bus = EventBus::new(settings.event_buffer_size);
        let shutdown = CancellationToken::new();
        let relay = EventRelay::new(bus.clone(), shutdown.clone());
        let poller = PositionPoller::start(&relay, settings.position_interval(), &shutdown);

        info!(
            connections = ?registry.names(),
            max_concurrent_loads = settings.max_concurrent_loads,
            "load orchestrator started"
        );

        Ok(LoadOrchestrator {
            shared: Arc::new(Shared {
                load_slots: Semaphore::new(settings.max_concurrent_loads),
                volume: Mutex::new(VolumeState {
                    level: settings.initial_volume,
                    before_mute: None,
                }),
                connections: RwLock::new(registry),
                catalog: self.catalog,
                resolver,
                device_hints: self.config.device_hints.clone(),
                mobile_override: Mutex::new(None),
                sounds: SoundCache::new(),
                errors: ErrorCache::new(self.config.clock.clone()),
                one_at_a_time: OneAtATime::new(),
                relay,
                poller,
                bus,
                active_loads: AtomicUsize::new(0),
                requests: AtomicU64::new(0),
                plays: AtomicU64::new(0),
                play_token: Mutex::new(None),
                shared_audio: SharedAudioToken::new(),
                shutdown,
                settings,
            }),
        })
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

struct VolumeState {
    level: u8,
    before_mute: Option<u8>,
}

struct Shared {
    settings: PlaybackSettings,
    catalog: Vec<Arc<dyn Connection>>,
    connections: RwLock<ConnectionRegistry>,
    resolver: Arc<dyn UrlResolver>,
    device_hints: Arc<dyn DeviceHintProvider>,
    mobile_override: Mutex<Option<bool>>,
    sounds: SoundCache,
    errors: ErrorCache,
    one_at_a_time: OneAtATime,
    relay: Arc<EventRelay>,
    poller: PositionPoller,
    bus: EventBus,
    load_slots: Semaphore,
    active_loads: AtomicUsize,
    requests: AtomicU64,
    plays: AtomicU64,
    play_token: Mutex<Option<(u64, CancellationToken)>>,
    volume: Mutex<VolumeState>,
    shared_audio: SharedAudioToken,
    shutdown: CancellationToken,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Top-level coordinator. Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct LoadOrchestrator {
    shared: Arc<Shared>,
}

impl LoadOrchestrator {
    pub fn builder(config: CoreConfig) -> LoadOrchestratorBuilder {
        LoadOrchestratorBuilder {
            config,
            catalog: Vec::new(),
            resolver: None,
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Finds or loads a sound for the first playable url.
    ///
    /// Attempt failures never surface as `Err`: an exhausted load returns
    /// [`LoadOutcome::Failed`] and publishes `audio-load-error`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Resolution`] when the input is empty, rejected or
    ///   contains an unusable url
    /// - [`PlaybackError::NoConnections`] when no connection is active
    #[instrument(skip(self, input, options))]
    pub async fn load(
        &self,
        input: impl Into<UrlInput>,
        options: SoundOptions,
    ) -> Result<LoadOutcome> {
        let input = input.into();
        self.announce_request(&input);
        self.run_load(input, &options).await
    }

    /// Loads and starts playback, waiting until the sound plays or errors.
    ///
    /// A later call to `play` cancels this one; it then resolves to
    /// [`LoadOutcome::Cancelled`] without publishing a load error.
    #[instrument(skip(self, input, options))]
    pub async fn play(
        &self,
        input: impl Into<UrlInput>,
        options: SoundOptions,
    ) -> Result<LoadOutcome> {
        let input = input.into();
        let generation = self.shared.plays.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let superseded = self
            .shared
            .play_token
            .lock()
            .replace((generation, token.clone()));
        if let Some((previous, previous_token)) = superseded {
            debug!(previous, generation, "cancelling play in flight");
            previous_token.cancel();
        }

        let result = core_async::select! {
            biased;
            _ = token.cancelled() => {
                debug!(generation, "play superseded");
                Ok(LoadOutcome::Cancelled)
            }
            result = self.run_play(input, &options) => result,
        };

        let mut slot = self.shared.play_token.lock();
        if slot.as_ref().map(|(g, _)| *g) == Some(generation) {
            *slot = None;
        }
        result
    }

    async fn run_play(&self, input: UrlInput, options: &SoundOptions) -> Result<LoadOutcome> {
        if let Some(current) = self.current_sound() {
            if current.is_playing() {
                self.publish(ServiceEvent::CurrentSoundInterrupted {
                    sound: current.to_ref(),
                });
                current.pause();
            }
        }

        self.announce_request(&input);
        let outcome = self.run_load(input, options).await?;
        let LoadOutcome::Ready { sound, .. } = &outcome else {
            return Ok(outcome);
        };

        sound.play_from(options.position);
        let state = sound
            .wait_for_state(|state| matches!(state, SoundState::Playing | SoundState::Errored))
            .await;
        if state == SoundState::Errored {
            warn!(
                sound = %sound.id(),
                error = sound.error().as_deref().unwrap_or(""),
                "sound errored while starting playback"
            );
        }
        Ok(outcome)
    }

    fn announce_request(&self, input: &UrlInput) {
        let request_id = self.shared.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let urls = input.describe();
        info!(
            request_id,
            urls = ?urls.as_ref().map(|u| u.iter().map(|s| redact_url(s)).collect::<Vec<_>>()),
            "new load request"
        );
        self.publish(ServiceEvent::NewLoadRequest { request_id, urls });
    }

    async fn run_load(&self, input: UrlInput, options: &SoundOptions) -> Result<LoadOutcome> {
        let _loading = LoadingGuard::enter(&self.shared.active_loads);
        let _slot = self
            .shared
            .load_slots
            .acquire()
            .await
            .map_err(|_| PlaybackError::Internal("load slots closed".to_string()))?;

        let urls = self.shared.resolver.resolve(input).await?;
        let raw_urls: Vec<String> = urls.iter().map(|url| url.to_string()).collect();
        self.publish(ServiceEvent::PreLoad {
            urls: raw_urls.clone(),
        });

        if let Some(sound) = self.shared.sounds.find(&urls) {
            debug!(sound = %sound.id(), "cache hit");
            return Ok(LoadOutcome::Ready {
                sound,
                failures: Vec::new(),
            });
        }

        let registry = self.shared.connections.read().clone();
        if registry.is_empty() {
            return Err(PlaybackError::NoConnections);
        }

        let hints = self.plan_hints(options);
        let attempts = planner::plan(&urls, &registry, &hints);
        debug!(attempts = attempts.len(), "attempt plan ready");

        let mut failures: Vec<AttemptFailure> = Vec::new();
        for attempt in &attempts {
            match self.try_attempt(attempt).await {
                Ok(sound) => return Ok(self.complete_load(sound, options, failures)),
                Err(message) => {
                    self.shared
                        .errors
                        .record(&attempt.url, &attempt.connection_name, message.clone());
                    failures.push(AttemptFailure {
                        connection: attempt.connection_name.clone(),
                        url: attempt.url.to_string(),
                        message,
                    });
                }
            }
        }

        let message = failure_message(&failures, &hints.native_connection);
        warn!(
            attempts = failures.len(),
            message = message.as_deref().unwrap_or(""),
            "every strategy failed"
        );
        self.publish(ServiceEvent::LoadError {
            urls: raw_urls.clone(),
            failures: failures.iter().map(FailureRecord::from).collect(),
            message: message.clone(),
        });
        Ok(LoadOutcome::Failed(LoadFailure {
            urls: raw_urls,
            failures,
            message,
        }))
    }

    /// Runs one attempt. Returns the ready sound, or the failure message.
    async fn try_attempt(&self, attempt: &AttemptDescriptor) -> std::result::Result<Sound, String> {
        let url = redact_url(attempt.url.as_str());
        debug!(connection = %attempt.connection_name, url = %url, "TRYING");

        let sound = Sound::new(attempt.url.clone(), attempt.connection_name.clone());
        let guard = AttemptGuard::new(sound.clone());

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let (error_tx, error_rx) = oneshot::channel::<String>();
        let ready_tx = Mutex::new(Some(ready_tx));
        let error_tx = Mutex::new(Some(error_tx));

        let _on_ready = sound.subscribe(SoundEventKind::Ready, move |sound, _| {
            if sound.is_errored() {
                return;
            }
            if let Some(tx) = ready_tx.lock().take() {
                let _ = tx.send(());
            }
        });
        let _on_error = sound.subscribe(SoundEventKind::Errored, move |_, event| {
            if let SoundEvent::Errored { message } = event {
                if let Some(tx) = error_tx.lock().take() {
                    let _ = tx.send(message.clone());
                }
            }
        });

        let request = CreateSound {
            url: attempt.url.clone(),
            options: attempt.options.clone(),
            shared_audio: attempt.shared_audio,
            reporter: sound.reporter(),
        };
        let created = attempt
            .connection
            .create(request)
            .await
            .and_then(|backend| sound.attach_backend(backend));
        if let Err(e) = created {
            debug!(connection = %attempt.connection_name, url = %url, error = %e, "FAILED");
            return Err(e.to_string());
        }

        let outcome = core_async::select! {
            biased;
            Ok(()) = ready_rx => Ok(()),
            Ok(message) = error_rx => Err(message),
            else => Err("sound was torn down before it became ready".to_string()),
        };

        // A sound that reported ready and then errored during `create` is
        // still a failed attempt.
        let outcome = outcome.and_then(|()| {
            if sound.is_errored() {
                Err(sound.error().unwrap_or_default())
            } else {
                Ok(())
            }
        });

        match outcome {
            Ok(()) => {
                debug!(connection = %attempt.connection_name, url = %url, "SUCCESS");
                Ok(guard.disarm())
            }
            Err(message) => {
                debug!(connection = %attempt.connection_name, url = %url, error = %message, "FAILED");
                Err(message)
            }
        }
    }

    fn complete_load(
        &self,
        sound: Sound,
        options: &SoundOptions,
        failures: Vec<AttemptFailure>,
    ) -> LoadOutcome {
        sound.set_metadata(options.metadata.clone());

        if !self.shared.sounds.insert(&sound) {
            if let Some(existing) = self.shared.sounds.get(sound.url()) {
                debug!(sound = %existing.id(), "url cached by a concurrent load");
                sound.destroy();
                return LoadOutcome::Ready {
                    sound: existing,
                    failures,
                };
            }
        }

        self.shared.one_at_a_time.register(&sound);
        self.hook_played(&sound);
        Self::hook_errored(&sound);
        sound.set_volume(self.volume());

        info!(
            sound = %sound.id(),
            connection = sound.connection(),
            url = %redact_url(sound.url().as_str()),
            "sound loaded"
        );
        self.publish(ServiceEvent::LoadSuccess {
            sound: sound.to_ref(),
            failures: failures.iter().map(FailureRecord::from).collect(),
        });
        LoadOutcome::Ready { sound, failures }
    }

    fn hook_played(&self, sound: &Sound) {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        sound.on(SoundEventKind::Played, move |sound, _| {
            if let Some(shared) = shared.upgrade() {
                LoadOrchestrator { shared }.on_sound_played(sound);
            }
        });
    }

    /// An error after loading is unrecoverable: the sound is destroyed,
    /// which evicts it from the cache and single playback and clears it as
    /// the current sound.
    fn hook_errored(sound: &Sound) {
        sound.on(SoundEventKind::Errored, |sound, event| {
            if let SoundEvent::Errored { message } = event {
                warn!(sound = %sound.id(), error = %message, "loaded sound errored");
            }
            sound.destroy();
        });
    }

    /// Runs after single playback paused the other sounds.
    fn on_sound_played(&self, sound: &Sound) {
        let interrupted = self.shared.one_at_a_time.take_interrupted(sound.id());
        let previous = self.shared.relay.current();

        if let Some(previous) = &previous {
            if previous == sound {
                return;
            }
            if previous.is_playing() || interrupted.contains(previous) {
                self.publish(ServiceEvent::CurrentSoundInterrupted {
                    sound: previous.to_ref(),
                });
            }
        }

        self.switch_current(sound, previous.as_ref());
        self.shared.relay.republish(sound, &SoundEvent::Played);
    }

    fn switch_current(&self, sound: &Sound, previous: Option<&Sound>) {
        self.publish(ServiceEvent::CurrentSoundChanged {
            sound: sound.to_ref(),
            previous: previous.map(Sound::to_ref),
        });
        self.shared.relay.set_current(sound);
        sound.set_volume(self.volume());
        info!(
            sound = %sound.id(),
            previous = ?previous.map(Sound::id),
            "current sound changed"
        );
    }

    fn plan_hints(&self, options: &SoundOptions) -> PlanHints {
        let is_mobile = self.is_mobile_device();
        let single_element = is_mobile
            || self.shared.settings.always_use_single_audio_element
            || self.shared.device_hints.force_single_audio_element()
            || options.force_single_audio_element;

        PlanHints {
            preferred_connections: options.use_connections.clone(),
            is_mobile,
            native_connection: NATIVE_CONNECTION.to_string(),
            shared_audio: single_element.then_some(self.shared.shared_audio),
        }
    }

    fn publish(&self, event: ServiceEvent) {
        self.shared.relay.publish(CoreEvent::Service(event));
    }

    /// Looks up a cached sound for `input` without loading anything.
    pub async fn find_loaded(&self, input: impl Into<UrlInput>) -> Result<Option<Sound>> {
        let urls = self.shared.resolver.resolve(input.into()).await?;
        Ok(self.shared.sounds.find(&urls))
    }

    // ------------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------------

    fn require_current(&self, operation: &'static str) -> Result<Sound> {
        self.current_sound()
            .ok_or(PlaybackError::Precondition { operation })
    }

    pub fn pause(&self) -> Result<()> {
        self.require_current("pause")?.pause();
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.require_current("stop")?.stop();
        Ok(())
    }

    /// Pauses the current sound when it plays, resumes it otherwise.
    pub fn toggle_pause(&self) -> Result<()> {
        let sound = self.require_current("toggle pause")?;
        if sound.is_playing() {
            sound.pause();
        } else {
            sound.play();
        }
        Ok(())
    }

    pub fn fast_forward(&self, by: Duration) -> Result<()> {
        self.require_current("fast forward")?.fast_forward(by);
        Ok(())
    }

    pub fn rewind(&self, by: Duration) -> Result<()> {
        self.require_current("rewind")?.rewind(by);
        Ok(())
    }

    pub fn set_position(&self, position: Duration) -> Result<()> {
        self.require_current("set position")?.set_position(position);
        Ok(())
    }

    /// Makes `sound` current without playing it.
    pub fn set_current_sound(&self, sound: &Sound) {
        let previous = self.shared.relay.current();
        if previous.as_ref() == Some(sound) {
            return;
        }
        self.switch_current(sound, previous.as_ref());
    }

    // ------------------------------------------------------------------------
    // Volume
    // ------------------------------------------------------------------------

    /// System volume between 0 and 100.
    pub fn volume(&self) -> u8 {
        self.shared.volume.lock().level
    }

    pub fn is_muted(&self) -> bool {
        self.volume() == 0
    }

    /// Sets the system volume and applies it to the current sound.
    pub fn set_volume(&self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        self.shared.volume.lock().level = volume;
        self.apply_volume(volume);
        Ok(())
    }

    /// Mutes, or restores the level from before muting. When that level was
    /// zero the initial volume is restored instead.
    pub fn toggle_mute(&self) -> u8 {
        let level = {
            let mut volume = self.shared.volume.lock();
            if volume.level > 0 {
                volume.before_mute = Some(volume.level);
                volume.level = 0;
            } else {
                let initial = match self.shared.settings.initial_volume {
                    0 => 100,
                    level => level,
                };
                volume.level = volume
                    .before_mute
                    .take()
                    .filter(|level| *level > 0)
                    .unwrap_or(initial);
            }
            volume.level
        };
        self.apply_volume(level);
        level
    }

    fn apply_volume(&self, level: u8) {
        if let Some(sound) = self.current_sound() {
            sound.set_volume(level);
        }
        debug!(volume = level, "system volume changed");
        self.publish(ServiceEvent::VolumeChange { volume: level });
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn current_sound(&self) -> Option<Sound> {
        self.shared.relay.current()
    }

    pub fn is_playing(&self) -> bool {
        self.current_sound().map_or(false, |sound| sound.is_playing())
    }

    /// Whether any load is queued or running.
    pub fn is_loading(&self) -> bool {
        self.shared.active_loads.load(Ordering::SeqCst) > 0
    }

    pub fn duration(&self) -> Option<Duration> {
        self.current_sound().and_then(|sound| sound.duration())
    }

    pub fn position(&self) -> Option<Duration> {
        self.current_sound().map(|sound| sound.position())
    }

    pub fn percent_loaded(&self) -> Option<f32> {
        self.current_sound().and_then(|sound| sound.percent_loaded())
    }

    pub fn current_metadata(&self) -> Option<Metadata> {
        self.current_sound().map(|sound| sound.metadata())
    }

    pub fn is_stream(&self) -> bool {
        self.current_sound().map_or(false, |sound| sound.is_stream())
    }

    pub fn is_fast_forwardable(&self) -> bool {
        self.current_sound()
            .map_or(false, |sound| sound.is_fast_forwardable())
    }

    pub fn is_rewindable(&self) -> bool {
        self.current_sound().map_or(false, |sound| sound.is_rewindable())
    }

    pub fn available_connections(&self) -> Vec<String> {
        self.shared.connections.read().names()
    }

    /// Device hint, unless overridden with [`set_mobile_device`](Self::set_mobile_device).
    pub fn is_mobile_device(&self) -> bool {
        (*self.shared.mobile_override.lock())
            .unwrap_or_else(|| self.shared.device_hints.is_mobile())
    }

    /// Overrides mobile detection. `None` goes back to the device hint.
    pub fn set_mobile_device(&self, is_mobile: Option<bool>) {
        *self.shared.mobile_override.lock() = is_mobile;
    }

    /// Token passed to connections when shared audio access is required.
    pub fn shared_audio_token(&self) -> SharedAudioToken {
        self.shared.shared_audio
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.shared.settings
    }

    pub fn sound_cache(&self) -> &SoundCache {
        &self.shared.sounds
    }

    pub fn error_cache(&self) -> &ErrorCache {
        &self.shared.errors
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Stream of every canonical event published from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.shared.bus.subscribe())
    }

    pub fn position_poll_interval(&self) -> Duration {
        self.shared.poller.period()
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Re-activates connections at runtime. Loads already running keep the
    /// connections they started with.
    pub fn load_connections(&self, settings: Vec<ConnectionSettings>) -> Result<()> {
        let registry = ConnectionRegistry::activate(&self.shared.catalog, &settings)?;
        info!(connections = ?registry.names(), "connections reloaded");
        *self.shared.connections.write() = registry;
        Ok(())
    }

    /// Stops background work, cancels the play in flight and destroys every
    /// cached sound.
    pub fn shutdown(&self) {
        if let Some((_, token)) = self.shared.play_token.lock().take() {
            token.cancel();
        }
        self.shared.poller.stop();
        self.shared.relay.clear_current();
        self.shared.sounds.clear();
        self.shared.shutdown.cancel();
        info!("load orchestrator shut down");
    }
}

impl std::fmt::Debug for LoadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOrchestrator")
            .field("connections", &self.available_connections())
            .field("cached", &self.shared.sounds.len())
            .field("current", &self.shared.relay.current_id())
            .finish()
    }
}

// ============================================================================
// Guards
// ============================================================================

struct LoadingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Destroys the attempt's sound unless the attempt succeeded. Also runs when
/// a cancelled play drops the attempt mid-flight.
struct AttemptGuard {
    sound: Sound,
    armed: bool,
}

impl AttemptGuard {
    fn new(sound: Sound) -> Self {
        Self { sound, armed: true }
    }

    fn disarm(mut self) -> Sound {
        self.armed = false;
        self.sound.clone()
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if self.armed {
            self.sound.destroy();
        }
    }
}
