//! Load options and results.

use core_runtime::events::FailureRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sound::{Metadata, Sound};

/// Per-call options for `load` and `play`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundOptions {
    /// Attached to the sound on success (title, artist...).
    #[serde(default)]
    pub metadata: Metadata,

    /// Restricts attempts to these connections, in this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_connections: Option<Vec<String>>,

    /// Where `play` starts. Ignored by `load`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Duration>,

    /// Requests shared audio access even on desktop devices.
    #[serde(default)]
    pub force_single_audio_element: bool,
}

impl SoundOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_connections<I, S>(mut self, connections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.use_connections = Some(connections.into_iter().map(Into::into).collect());
        self
    }

    pub fn starting_at(mut self, position: Duration) -> Self {
        self.position = Some(position);
        self
    }

    pub fn single_audio_element(mut self, force: bool) -> Self {
        self.force_single_audio_element = force;
        self
    }
}

/// One failed attempt of a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub connection: String,
    pub url: String,
    pub message: String,
}

impl From<&AttemptFailure> for FailureRecord {
    fn from(failure: &AttemptFailure) -> Self {
        FailureRecord {
            connection: failure.connection.clone(),
            url: failure.url.clone(),
            message: failure.message.clone(),
        }
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub urls: Vec<String>,
    pub failures: Vec<AttemptFailure>,
    /// Most relevant error message, when any attempt produced one.
    pub message: Option<String>,
}

/// How a `load` or `play` call ended.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// A sound is ready. `failures` lists the attempts that failed before it.
    Ready {
        sound: Sound,
        failures: Vec<AttemptFailure>,
    },
    Failed(LoadFailure),
    /// A newer `play` call superseded this one.
    Cancelled,
}

impl LoadOutcome {
    pub fn sound(&self) -> Option<&Sound> {
        match self {
            LoadOutcome::Ready { sound, .. } => Some(sound),
            _ => None,
        }
    }

    pub fn into_sound(self) -> Option<Sound> {
        match self {
            LoadOutcome::Ready { sound, .. } => Some(sound),
            _ => None,
        }
    }

    /// Attempt failures, whether or not the load succeeded in the end.
    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            LoadOutcome::Ready { failures, .. } => failures,
            LoadOutcome::Failed(failure) => &failure.failures,
            LoadOutcome::Cancelled => &[],
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadOutcome::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }
}

/// Picks the message reported for an exhausted load: the native connection's
/// message when it produced a non-empty one, else the first non-empty one.
pub(crate) fn failure_message(failures: &[AttemptFailure], native: &str) -> Option<String> {
    let non_empty = |f: &&AttemptFailure| !f.message.trim().is_empty();
    failures
        .iter()
        .filter(non_empty)
        .find(|f| f.connection == native)
        .or_else(|| failures.iter().find(non_empty))
        .map(|f| f.message.clone())
}
