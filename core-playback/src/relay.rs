//! # Event Relay
//!
//! Binds the lifecycle events of the current sound and republishes them on
//! the [`EventBus`] under their canonical names.
//!
//! ```text
//!  Sound (current) ──bridges──┐
//!                             ├──> ordered queue ──forwarder task──> EventBus
//!  LoadOrchestrator ──publish─┘
//! ```
//!
//! Everything the core publishes goes through one queue drained by a single
//! forwarder task, so observers see events in the order they were produced and
//! listeners never block on bus subscribers.
//!
//! Only the current sound is bridged. Switching the current sound drops the
//! old bridges and installs the new ones under a single lock.

use core_async::sync::{mpsc, CancellationToken};
use core_runtime::events::{AudioEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::sound::{Sound, SoundEvent, SoundEventKind, SoundId, Subscription, WeakSound};

/// Sound events forwarded to the bus while their sound is current.
pub const RELAYED_EVENTS: [SoundEventKind; 11] = [
    SoundEventKind::Played,
    SoundEventKind::Paused,
    SoundEventKind::Ended,
    SoundEventKind::DurationChanged,
    SoundEventKind::PositionChanged,
    SoundEventKind::Loaded,
    SoundEventKind::Loading,
    SoundEventKind::PositionWillChange,
    SoundEventKind::WillRewind,
    SoundEventKind::WillFastForward,
    SoundEventKind::MetadataChanged,
];

struct Binding {
    sound: WeakSound,
    _subscriptions: Vec<Subscription>,
}

/// Tracks the current sound and forwards canonical events.
pub struct EventRelay {
    queue: mpsc::UnboundedSender<CoreEvent>,
    current: Mutex<Option<Binding>>,
}

impl EventRelay {
    /// Creates the relay and spawns its forwarder task.
    ///
    /// Must be called inside a tokio runtime. The forwarder stops when
    /// `shutdown` is cancelled; events still queued at that point are dropped.
    pub fn new(bus: EventBus, shutdown: CancellationToken) -> Arc<Self> {
        let (queue, mut pending) = mpsc::unbounded_channel::<CoreEvent>();

        core_async::spawn(async move {
            loop {
                core_async::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    next = pending.recv() => match next {
                        Some(event) => {
                            trace!(event = event.name(), "forwarding event");
                            // No subscribers is not an error for the core.
                            let _ = bus.emit(event);
                        }
                        None => break,
                    },
                }
            }
            debug!("event forwarder stopped");
        });

        Arc::new(Self {
            queue,
            current: Mutex::new(None),
        })
    }

    /// Queues `event` behind everything published before it.
    pub fn publish(&self, event: CoreEvent) {
        if self.queue.send(event).is_err() {
            debug!("event dropped: forwarder stopped");
        }
    }

    /// Publishes the canonical form of `event` on behalf of `sound`.
    /// Events with no canonical counterpart are ignored.
    pub fn republish(&self, sound: &Sound, event: &SoundEvent) {
        if let Some(canonical) = canonical_event(sound, event) {
            self.publish(CoreEvent::Audio(canonical));
        }
    }

    pub fn current(&self) -> Option<Sound> {
        self.current
            .lock()
            .as_ref()
            .and_then(|binding| binding.sound.upgrade())
    }

    pub fn current_id(&self) -> Option<SoundId> {
        self.current.lock().as_ref().map(|binding| binding.sound.id())
    }

    pub fn is_current(&self, sound: &Sound) -> bool {
        self.current_id() == Some(sound.id())
    }

    /// Makes `sound` the current sound, rebinding the bridges.
    ///
    /// Returns the previous current sound, if it is still alive. Setting the
    /// sound that is already current changes nothing.
    pub fn set_current(self: &Arc<Self>, sound: &Sound) -> Option<Sound> {
        if self.is_current(sound) {
            return Some(sound.clone());
        }

        let mut subscriptions = Vec::with_capacity(RELAYED_EVENTS.len() + 1);
        for kind in RELAYED_EVENTS {
            let relay = Arc::downgrade(self);
            subscriptions.push(sound.subscribe(kind, move |sound, event| {
                if let Some(relay) = relay.upgrade() {
                    relay.republish(sound, event);
                }
            }));
        }

        let relay = Arc::downgrade(self);
        subscriptions.push(sound.subscribe(SoundEventKind::Teardown, move |sound, _| {
            if let Some(relay) = relay.upgrade() {
                relay.clear_if_current(sound.id());
            }
        }));

        let previous = {
            let mut current = self.current.lock();
            current.replace(Binding {
                sound: sound.downgrade(),
                _subscriptions: subscriptions,
            })
        };

        info!(sound = %sound.id(), connection = sound.connection(), "current sound set");
        previous.and_then(|binding| binding.sound.upgrade())
    }

    /// Forgets the current sound and drops its bridges.
    pub fn clear_current(&self) -> Option<Sound> {
        let previous = self.current.lock().take();
        previous.and_then(|binding| binding.sound.upgrade())
    }

    fn clear_if_current(&self, id: SoundId) {
        let previous = {
            let mut current = self.current.lock();
            match current.as_ref() {
                Some(binding) if binding.sound.id() == id => current.take(),
                _ => None,
            }
        };
        if previous.is_some() {
            debug!(sound = %id, "current sound torn down");
        }
    }
}

impl std::fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRelay")
            .field("current", &self.current_id())
            .finish()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Canonical bus form of a sound event. `Ready`, `Errored` and `Teardown`
/// are handled by the orchestrator and have none.
pub fn canonical_event(sound: &Sound, event: &SoundEvent) -> Option<AudioEvent> {
    let sound = sound.to_ref();
    let canonical = match event {
        SoundEvent::Played => AudioEvent::Played { sound },
        SoundEvent::Paused => AudioEvent::Paused { sound },
        SoundEvent::Ended => AudioEvent::Ended { sound },
        SoundEvent::DurationChanged(duration) => AudioEvent::DurationChanged {
            sound,
            duration_ms: duration.map(millis),
        },
        SoundEvent::PositionChanged(position) => AudioEvent::PositionChanged {
            sound,
            position_ms: millis(*position),
        },
        SoundEvent::Loaded => AudioEvent::Loaded { sound },
        SoundEvent::Loading { percent_loaded } => AudioEvent::Loading {
            sound,
            percent_loaded: *percent_loaded,
        },
        SoundEvent::PositionWillChange { from, to } => AudioEvent::PositionWillChange {
            sound,
            from_ms: millis(*from),
            to_ms: millis(*to),
        },
        SoundEvent::WillRewind { from, to } => AudioEvent::WillRewind {
            sound,
            from_ms: millis(*from),
            to_ms: millis(*to),
        },
        SoundEvent::WillFastForward { from, to } => AudioEvent::WillFastForward {
            sound,
            from_ms: millis(*from),
            to_ms: millis(*to),
        },
        SoundEvent::MetadataChanged(metadata) => AudioEvent::MetadataChanged {
            sound,
            metadata: serde_json::Value::Object(metadata.clone()),
        },
        SoundEvent::Ready | SoundEvent::Errored { .. } | SoundEvent::Teardown => return None,
    };
    Some(canonical)
}
