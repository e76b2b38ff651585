//! Normalized url -> live sound.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::locator::SoundUrl;
use crate::sound::{Sound, SoundEventKind};

type Entries = HashMap<String, Sound>;

/// Cache of successfully loaded sounds.
///
/// Cloning shares the underlying map. Entries forget themselves when their
/// sound is torn down, however that teardown was triggered.
#[derive(Debug, Clone, Default)]
pub struct SoundCache {
    entries: Arc<Mutex<Entries>>,
}

impl SoundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First cached sound among `urls`, in order.
    pub fn find(&self, urls: &[SoundUrl]) -> Option<Sound> {
        let entries = self.entries.lock();
        urls.iter().find_map(|url| entries.get(url.key()).cloned())
    }

    pub fn get(&self, url: &SoundUrl) -> Option<Sound> {
        self.entries.lock().get(url.key()).cloned()
    }

    pub fn contains(&self, url: &SoundUrl) -> bool {
        self.entries.lock().contains_key(url.key())
    }

    /// Caches `sound` under its own url.
    ///
    /// Returns `false` and leaves the cache untouched when the key already
    /// holds a sound.
    pub fn insert(&self, sound: &Sound) -> bool {
        let key = sound.url().key().to_string();
        {
            let mut entries = self.entries.lock();
            if entries.contains_key(&key) {
                return false;
            }
            entries.insert(key.clone(), sound.clone());
        }

        let weak_entries: Weak<Mutex<Entries>> = Arc::downgrade(&self.entries);
        let id = sound.id();
        sound.on(SoundEventKind::Teardown, move |_, _| {
            if let Some(entries) = weak_entries.upgrade() {
                let mut entries = entries.lock();
                if entries.get(&key).map(|cached| cached.id()) == Some(id) {
                    entries.remove(&key);
                }
            }
        });

        debug!(key = sound.url().key(), sound = %id, "sound cached");
        true
    }

    /// Removes and destroys the sound cached for `url`.
    pub fn remove(&self, url: &SoundUrl) -> Option<Sound> {
        let removed = self.entries.lock().remove(url.key());
        if let Some(sound) = &removed {
            sound.destroy();
        }
        removed
    }

    /// Destroys every cached sound.
    pub fn clear(&self) {
        let drained: Vec<Sound> = self.entries.lock().drain().map(|(_, s)| s).collect();
        for sound in drained {
            sound.destroy();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
