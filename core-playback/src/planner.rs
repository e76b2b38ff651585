//! Attempt planning.
//!
//! Pure ordering logic: given the resolved urls and the active connections,
//! decide which (connection, url) pairs to try and in what order. No I/O and
//! no state; the orchestrator consumes the plan front to back.

use core_runtime::config::NATIVE_CONNECTION;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::connection::{ConnectionRegistry, RegisteredConnection};
use crate::locator::SoundUrl;
use crate::traits::{Connection, SharedAudioToken};

/// One planned attempt.
#[derive(Clone)]
pub struct AttemptDescriptor {
    pub connection_name: String,
    pub connection: Arc<dyn Connection>,
    pub url: SoundUrl,
    pub options: Option<Value>,
    pub shared_audio: Option<SharedAudioToken>,
}

impl fmt::Debug for AttemptDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptDescriptor")
            .field("connection", &self.connection_name)
            .field("url", &self.url.as_str())
            .field("shared_audio", &self.shared_audio)
            .finish()
    }
}

/// Inputs that change the attempt order.
#[derive(Debug, Clone)]
pub struct PlanHints {
    /// Restricts attempts to these connections, in this order.
    pub preferred_connections: Option<Vec<String>>,
    pub is_mobile: bool,
    /// Connection moved to the front on mobile devices.
    pub native_connection: String,
    pub shared_audio: Option<SharedAudioToken>,
}

impl Default for PlanHints {
    fn default() -> Self {
        Self {
            preferred_connections: None,
            is_mobile: false,
            native_connection: NATIVE_CONNECTION.to_string(),
            shared_audio: None,
        }
    }
}

impl PlanHints {
    pub fn mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = is_mobile;
        self
    }

    pub fn preferred(mut self, connections: Vec<String>) -> Self {
        self.preferred_connections = Some(connections);
        self
    }

    pub fn shared_audio(mut self, token: Option<SharedAudioToken>) -> Self {
        self.shared_audio = token;
        self
    }
}

/// Builds the ordered attempt list.
///
/// - With preferred connections: url-major, one attempt per preferred name
///   (in the given order) that is registered and can play the url.
/// - On mobile: the standard plan with native attempts moved to the front,
///   relative order otherwise kept.
/// - Otherwise: url-major, one attempt per registered connection that can
///   play the url.
pub fn plan(
    urls: &[SoundUrl],
    connections: &ConnectionRegistry,
    hints: &PlanHints,
) -> Vec<AttemptDescriptor> {
    if let Some(preferred) = &hints.preferred_connections {
        let selected: Vec<&RegisteredConnection> = preferred
            .iter()
            .filter_map(|name| {
                let entry = connections.get(name);
                if entry.is_none() {
                    warn!(connection = %name, "preferred connection is not registered, skipping");
                }
                entry
            })
            .collect();
        return url_major(urls, selected.into_iter(), hints);
    }

    let standard = url_major(urls, connections.iter(), hints);
    if !hints.is_mobile {
        return standard;
    }

    let (mut native, others): (Vec<_>, Vec<_>) = standard
        .into_iter()
        .partition(|attempt| attempt.connection_name == hints.native_connection);
    native.extend(others);
    native
}

fn url_major<'a, I>(urls: &[SoundUrl], connections: I, hints: &PlanHints) -> Vec<AttemptDescriptor>
where
    I: Iterator<Item = &'a RegisteredConnection> + Clone,
{
    let mut attempts = Vec::new();
    for url in urls {
        for entry in connections.clone() {
            if !entry.connection.can_play(url) {
                continue;
            }
            attempts.push(AttemptDescriptor {
                connection_name: entry.name.clone(),
                connection: Arc::clone(&entry.connection),
                url: url.clone(),
                options: entry.options.clone(),
                shared_audio: hints.shared_audio,
            });
        }
    }
    attempts
}
