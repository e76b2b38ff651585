//! Process-wide single playback.
//!
//! Every sound the orchestrator hands out is registered here. When one of
//! them reports `Played`, every other registered sound that is still playing
//! is paused before any normal-priority listener of the new sound runs, so
//! ordinary observers never see two sounds playing at once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::sound::{Sound, SoundEventKind, SoundId, Subscription, WeakSound};

struct Registration {
    sound: WeakSound,
    _played: Subscription,
    _teardown: Subscription,
}

#[derive(Default)]
struct State {
    registrations: Vec<Registration>,
    /// Sounds paused because the keyed sound started playing.
    interrupted: HashMap<SoundId, Vec<WeakSound>>,
}

/// Enforces that at most one registered sound plays at a time.
#[derive(Clone, Default)]
pub struct OneAtATime {
    state: Arc<Mutex<State>>,
}

impl OneAtATime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts enforcing for `sound`. Returns `false` if it was already
    /// registered.
    pub fn register(&self, sound: &Sound) -> bool {
        if self.is_registered(sound) {
            return false;
        }

        let weak_state = Arc::downgrade(&self.state);
        let played = sound.subscribe_exclusive(SoundEventKind::Played, move |sound, _| {
            if let Some(state) = weak_state.upgrade() {
                pause_others(&state, sound);
            }
        });

        let weak_state = Arc::downgrade(&self.state);
        let teardown = sound.subscribe(SoundEventKind::Teardown, move |sound, _| {
            if let Some(state) = weak_state.upgrade() {
                forget(&state, sound.id());
            }
        });

        let registration = Registration {
            sound: sound.downgrade(),
            _played: played,
            _teardown: teardown,
        };

        let rejected = {
            let mut state = self.state.lock();
            if state.registrations.iter().any(|r| r.sound.id() == sound.id()) {
                Some(registration)
            } else {
                state.registrations.push(registration);
                None
            }
        };
        if rejected.is_some() {
            return false;
        }
        debug!(sound = %sound.id(), "registered for single playback");
        true
    }

    /// Stops enforcing for `sound`. Returns `false` if it was not registered.
    pub fn unregister(&self, sound: &Sound) -> bool {
        forget(&self.state, sound.id())
    }

    pub fn is_registered(&self, sound: &Sound) -> bool {
        self.state
            .lock()
            .registrations
            .iter()
            .any(|r| r.sound.id() == sound.id())
    }

    pub fn registered_count(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Sounds that were paused when `by` last started playing. Cleared on
    /// read.
    pub fn take_interrupted(&self, by: SoundId) -> Vec<Sound> {
        self.state
            .lock()
            .interrupted
            .remove(&by)
            .unwrap_or_default()
            .iter()
            .filter_map(WeakSound::upgrade)
            .collect()
    }
}

fn pause_others(state: &Mutex<State>, playing: &Sound) {
    let others: Vec<Sound> = {
        let state = state.lock();
        state
            .registrations
            .iter()
            .filter(|r| r.sound.id() != playing.id())
            .filter_map(|r| r.sound.upgrade())
            .filter(Sound::is_playing)
            .collect()
    };

    for other in &others {
        debug!(paused = %other.id(), by = %playing.id(), "pausing for single playback");
        other.pause();
    }

    let mut state = state.lock();
    if others.is_empty() {
        state.interrupted.remove(&playing.id());
    } else {
        state
            .interrupted
            .insert(playing.id(), others.iter().map(Sound::downgrade).collect());
    }
}

fn forget(state: &Mutex<State>, id: SoundId) -> bool {
    let removed = {
        let mut state = state.lock();
        state.interrupted.remove(&id);
        let position = state.registrations.iter().position(|r| r.sound.id() == id);
        position.map(|index| state.registrations.remove(index))
    };
    // Subscriptions are released here, outside the lock.
    removed.is_some()
}

impl std::fmt::Debug for OneAtATime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneAtATime")
            .field("registered", &self.registered_count())
            .finish()
    }
}
