//! Test doubles shared by the unit tests in this crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{PlaybackError, Result};
use crate::locator::SoundUrl;
use crate::sound::{Sound, SoundReporter};
use crate::traits::{Connection, CreateSound, SoundBackend};

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn base() -> Url {
    Url::parse("http://localhost/").unwrap()
}

pub(crate) fn sound_url(path: &str) -> SoundUrl {
    SoundUrl::parse(path, &base()).unwrap()
}

/// Backend that reports every command synchronously.
pub(crate) struct TestBackend {
    reporter: SoundReporter,
    calls: CallLog,
    position: Arc<Mutex<Option<Duration>>>,
    stream: bool,
}

impl TestBackend {
    pub(crate) fn new(reporter: SoundReporter, calls: CallLog) -> Self {
        Self {
            reporter,
            calls,
            position: Arc::new(Mutex::new(Some(Duration::ZERO))),
            stream: false,
        }
    }

    pub(crate) fn with_position(mut self, position: Arc<Mutex<Option<Duration>>>) -> Self {
        self.position = position;
        self
    }

    pub(crate) fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

impl SoundBackend for TestBackend {
    fn play(&self, _position: Option<Duration>) {
        self.calls.lock().push("play".into());
        self.reporter.played();
    }

    fn pause(&self) {
        self.calls.lock().push("pause".into());
        self.reporter.paused();
    }

    fn stop(&self) {
        self.calls.lock().push("stop".into());
        self.reporter.paused();
    }

    fn seek(&self, position: Duration) {
        self.calls.lock().push(format!("seek:{}", position.as_millis()));
    }

    fn set_volume(&self, volume: u8) {
        self.calls.lock().push(format!("volume:{}", volume));
    }

    fn current_position(&self) -> Result<Duration> {
        (*self.position.lock())
            .ok_or_else(|| PlaybackError::SourceUnavailable("position unknown".into()))
    }

    fn is_stream(&self) -> bool {
        self.stream
    }

    fn teardown(&self) {
        self.calls.lock().push("teardown".into());
    }
}

/// A sound in `Loading` state with a [`TestBackend`] attached.
pub(crate) fn sound_with_backend(path: &str) -> (Sound, CallLog) {
    let sound = Sound::new(sound_url(path), "NativeAudio");
    let calls = CallLog::default();
    let backend = TestBackend::new(sound.reporter(), calls.clone());
    sound.attach_backend(Box::new(backend)).unwrap();
    (sound, calls)
}

/// A sound that already reported `Ready`.
pub(crate) fn loaded_sound(path: &str) -> Sound {
    let (sound, _) = sound_with_backend(path);
    sound.reporter().ready();
    sound
}

/// Connection that plays the given extensions and reports ready at once.
/// Rejects `{"fail": true}` options during setup.
pub(crate) struct TestConnection {
    name: String,
    extensions: Vec<String>,
    setups: Mutex<Vec<Value>>,
}

impl TestConnection {
    pub(crate) fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            setups: Mutex::new(Vec::new()),
        }
    }

    /// Options passed to each `setup` call so far.
    pub(crate) fn setups(&self) -> Vec<Value> {
        self.setups.lock().clone()
    }
}

#[async_trait]
impl Connection for TestConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_play(&self, url: &SoundUrl) -> bool {
        url.extension()
            .map_or(false, |ext| self.extensions.contains(&ext))
    }

    fn setup(&self, options: &Value) -> Result<()> {
        self.setups.lock().push(options.clone());
        if options.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(PlaybackError::Internal("rejected options".into()));
        }
        Ok(())
    }

    async fn create(&self, request: CreateSound) -> Result<Box<dyn SoundBackend>> {
        let reporter = request.reporter.clone();
        let backend = TestBackend::new(request.reporter, CallLog::default());
        reporter.ready();
        Ok(Box::new(backend))
    }
}
