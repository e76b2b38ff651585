//! Scriptable connections and backends for the orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use core_playback::{
    Connection, CreateSound, PlaybackError, Result, SharedAudioToken, SoundBackend, SoundReporter,
    SoundUrl,
};
use core_runtime::config::{ConnectionSettings, CoreConfigBuilder};
use core_runtime::events::{CoreEvent, EventStream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Scripted Outcomes
// ============================================================================

/// What a [`MockConnection`] does for one path.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Reports ready right after `create`.
    Ready,
    /// Reports `errored(message)` right after `create`.
    Error(String),
    /// Returns a backend and never reports; the reporter is kept for the test.
    Pending,
    /// `create` itself fails.
    CreateError(String),
    /// Waits, then reports ready.
    Delayed(Duration),
    /// Reports ready and then `errored(message)` before `create` returns.
    ReadyThenError(String),
}

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Connection whose behavior is scripted per url path.
pub struct MockConnection {
    name: String,
    extensions: Vec<String>,
    fallback: Outcome,
    outcomes: Mutex<HashMap<String, Outcome>>,
    attempts: Mutex<Vec<String>>,
    tokens: Mutex<Vec<Option<SharedAudioToken>>>,
    pending: Mutex<Vec<SoundReporter>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    position: Arc<Mutex<Option<Duration>>>,
    calls: CallLog,
}

impl MockConnection {
    /// Plays `mp3` and `ogg`, ready for every path unless scripted.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: vec!["mp3".into(), "ogg".into()],
            fallback: Outcome::Ready,
            outcomes: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            position: Arc::new(Mutex::new(Some(Duration::ZERO))),
            calls: CallLog::default(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_fallback(mut self, outcome: Outcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn script(self, path: &str, outcome: Outcome) -> Self {
        self.outcomes.lock().insert(path.to_string(), outcome);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Paths attempted so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn tokens(&self) -> Vec<Option<SharedAudioToken>> {
        self.tokens.lock().clone()
    }

    pub fn pending(&self) -> Vec<SoundReporter> {
        self.pending.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Backend commands issued to sounds of this connection, as `command:path`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Position every backend of this connection reports. `None` fails the query.
    pub fn set_position(&self, position: Option<Duration>) {
        *self.position.lock() = position;
    }

    fn outcome_for(&self, url: &SoundUrl) -> Outcome {
        self.outcomes
            .lock()
            .get(url.path())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_play(&self, url: &SoundUrl) -> bool {
        url.extension()
            .map_or(false, |ext| self.extensions.contains(&ext))
    }

    async fn create(&self, request: CreateSound) -> Result<Box<dyn SoundBackend>> {
        let path = request.url.path().to_string();
        self.attempts.lock().push(path.clone());
        self.tokens.lock().push(request.shared_audio);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = self.outcome_for(&request.url);
        if let Outcome::Delayed(delay) = &outcome {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let backend = MockBackend {
            path,
            reporter: request.reporter.clone(),
            position: Arc::clone(&self.position),
            calls: Arc::clone(&self.calls),
        };

        match outcome {
            Outcome::Ready | Outcome::Delayed(_) => request.reporter.ready(),
            Outcome::Error(message) => request.reporter.errored(message),
            Outcome::ReadyThenError(message) => {
                request.reporter.ready();
                request.reporter.errored(message);
            }
            Outcome::Pending => self.pending.lock().push(request.reporter),
            Outcome::CreateError(message) => {
                return Err(PlaybackError::SourceUnavailable(message));
            }
        }
        Ok(Box::new(backend))
    }
}

/// Backend that answers every command synchronously.
pub struct MockBackend {
    path: String,
    reporter: SoundReporter,
    position: Arc<Mutex<Option<Duration>>>,
    calls: CallLog,
}

impl MockBackend {
    fn log(&self, command: impl std::fmt::Display) {
        self.calls.lock().push(format!("{}:{}", command, self.path));
    }
}

impl SoundBackend for MockBackend {
    fn play(&self, _position: Option<Duration>) {
        self.log("play");
        self.reporter.played();
    }

    fn pause(&self) {
        self.log("pause");
        self.reporter.paused();
    }

    fn stop(&self) {
        self.log("stop");
        self.reporter.paused();
    }

    fn seek(&self, position: Duration) {
        self.log(format!("seek={}", position.as_millis()));
    }

    fn set_volume(&self, volume: u8) {
        self.log(format!("volume={}", volume));
    }

    fn current_position(&self) -> Result<Duration> {
        (*self.position.lock())
            .ok_or_else(|| PlaybackError::SourceUnavailable("position not ready".into()))
    }

    fn teardown(&self) {
        self.log("teardown");
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn settings(names: &[&str]) -> Vec<ConnectionSettings> {
    names.iter().map(|name| ConnectionSettings::new(*name)).collect()
}

pub fn config(names: &[&str]) -> CoreConfigBuilder {
    core_runtime::config::CoreConfig::builder().connections(settings(names))
}

/// Receives events until one named `last` arrives; returns every name seen.
pub async fn names_until(stream: &mut EventStream, last: &str) -> Vec<&'static str> {
    let mut names = Vec::new();
    loop {
        let event = next_event(stream).await;
        names.push(event.name());
        if event.name() == last {
            return names;
        }
    }
}

/// Receives events until one named `name` arrives and returns it.
pub async fn wait_for(stream: &mut EventStream, name: &str) -> CoreEvent {
    loop {
        let event = next_event(stream).await;
        if event.name() == name {
            return event;
        }
    }
}

pub async fn next_event(stream: &mut EventStream) -> CoreEvent {
    tokio::time::timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
