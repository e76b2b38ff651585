//! # Core Configuration Module
//!
//! Configuration for the playback core.
//!
//! ## Overview
//!
//! [`PlaybackSettings`] holds the plain, serializable knobs (connection list,
//! initial volume, poll interval, load concurrency). It can be read from a host
//! configuration file; every field has a serde default.
//!
//! [`CoreConfig`] pairs those settings with the host bridges the core consumes
//! and is built through [`CoreConfigBuilder`], which validates everything up
//! front.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ConnectionSettings, CoreConfig};
//! use bridge_traits::StaticDeviceHints;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .connections(vec![
//!         ConnectionSettings::new("NativeAudio"),
//!         ConnectionSettings::new("Howler").with_options(serde_json::json!({ "html5": true })),
//!     ])
//!     .initial_volume(80)
//!     .device_hints(Arc::new(StaticDeviceHints::mobile()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, DeviceHintProvider, StaticDeviceHints, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Name of the connection that wraps the platform's native audio element.
pub const NATIVE_CONNECTION: &str = "NativeAudio";

/// Base against which relative sound URLs are resolved.
pub const DEFAULT_BASE_URL: &str = "http://localhost/";

const MAX_CONCURRENT_LOADS_LIMIT: usize = 64;
const MIN_POSITION_INTERVAL_MS: u64 = 10;
const MAX_POSITION_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// Connection Settings
// ============================================================================

/// A configured connection: the name of an available implementation plus
/// options forwarded to its `setup` and to every sound it creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl ConnectionSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

// ============================================================================
// Playback Settings
// ============================================================================

/// Serializable playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Connections in priority order.
    ///
    /// Default: `[NativeAudio]`.
    #[serde(default = "default_connections")]
    pub connections: Vec<ConnectionSettings>,

    /// Route every attempt through one shared audio resource even on desktop.
    #[serde(default)]
    pub always_use_single_audio_element: bool,

    /// System volume (0-100) applied to each sound that becomes current.
    ///
    /// Default: 100.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: u8,

    /// How often the current sound's position is sampled, in milliseconds.
    ///
    /// Default: 500.
    #[serde(default = "default_position_interval_ms")]
    pub position_interval_ms: u64,

    /// Loads allowed to run at once; extra loads queue in arrival order.
    ///
    /// Default: 5.
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,

    /// Capacity of the broadcast channel carrying canonical events.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Base URL used to resolve relative locators such as `/song.mp3`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            connections: default_connections(),
            always_use_single_audio_element: false,
            initial_volume: default_initial_volume(),
            position_interval_ms: default_position_interval_ms(),
            max_concurrent_loads: default_max_concurrent_loads(),
            event_buffer_size: default_event_buffer_size(),
            base_url: default_base_url(),
        }
    }
}

impl PlaybackSettings {
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }

    /// Parsed form of [`base_url`](Self::base_url).
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid base url '{}': {}", self.base_url, e)))
    }

    /// Validates the settings.
    ///
    /// An empty connection list is allowed; loads then fail with a
    /// no-connections error instead of construction failing.
    pub fn validate(&self) -> Result<()> {
        if self.initial_volume > 100 {
            return Err(Error::Config(format!(
                "Initial volume must be between 0 and 100, got {}",
                self.initial_volume
            )));
        }

        if self.position_interval_ms < MIN_POSITION_INTERVAL_MS
            || self.position_interval_ms > MAX_POSITION_INTERVAL_MS
        {
            return Err(Error::Config(format!(
                "Position interval must be between {}ms and {}ms, got {}ms",
                MIN_POSITION_INTERVAL_MS, MAX_POSITION_INTERVAL_MS, self.position_interval_ms
            )));
        }

        if self.max_concurrent_loads == 0 || self.max_concurrent_loads > MAX_CONCURRENT_LOADS_LIMIT
        {
            return Err(Error::Config(format!(
                "Concurrent loads must be between 1 and {}, got {}",
                MAX_CONCURRENT_LOADS_LIMIT, self.max_concurrent_loads
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for connection in &self.connections {
            if connection.name.trim().is_empty() {
                return Err(Error::Config("Connection name cannot be empty".to_string()));
            }
            if !seen.insert(connection.name.as_str()) {
                return Err(Error::Config(format!(
                    "Connection '{}' is configured more than once",
                    connection.name
                )));
            }
        }

        let base = self.base()?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Base url '{}' cannot resolve relative urls",
                self.base_url
            )));
        }

        Ok(())
    }
}

fn default_connections() -> Vec<ConnectionSettings> {
    vec![ConnectionSettings::new(NATIVE_CONNECTION)]
}

fn default_initial_volume() -> u8 {
    100
}

fn default_position_interval_ms() -> u64 {
    500
}

fn default_max_concurrent_loads() -> usize {
    5
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// ============================================================================
// Core Config
// ============================================================================

/// Settings plus host bridges. Build with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    pub settings: PlaybackSettings,

    /// Mobile detection (default: desktop hints)
    pub device_hints: Arc<dyn DeviceHintProvider>,

    /// Time source for failure records (default: system clock)
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings", &self.settings)
            .field("device_hints", &"DeviceHintProvider { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            settings: PlaybackSettings::default(),
            device_hints: Arc::new(StaticDeviceHints::desktop()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings: Option<PlaybackSettings>,
    connections: Option<Vec<ConnectionSettings>>,
    always_use_single_audio_element: Option<bool>,
    initial_volume: Option<u8>,
    position_interval: Option<Duration>,
    max_concurrent_loads: Option<usize>,
    event_buffer_size: Option<usize>,
    base_url: Option<String>,
    device_hints: Option<Arc<dyn DeviceHintProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Start from settings read elsewhere (e.g. a host config file).
    /// Individual setters still override fields.
    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn connections(mut self, connections: Vec<ConnectionSettings>) -> Self {
        self.connections = Some(connections);
        self
    }

    pub fn always_use_single_audio_element(mut self, enabled: bool) -> Self {
        self.always_use_single_audio_element = Some(enabled);
        self
    }

    pub fn initial_volume(mut self, volume: u8) -> Self {
        self.initial_volume = Some(volume);
        self
    }

    pub fn position_interval(mut self, interval: Duration) -> Self {
        self.position_interval = Some(interval);
        self
    }

    pub fn max_concurrent_loads(mut self, limit: usize) -> Self {
        self.max_concurrent_loads = Some(limit);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn device_hints(mut self, hints: Arc<dyn DeviceHintProvider>) -> Self {
        self.device_hints = Some(hints);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let mut settings = self.settings.unwrap_or_default();

        if let Some(connections) = self.connections {
            settings.connections = connections;
        }
        if let Some(enabled) = self.always_use_single_audio_element {
            settings.always_use_single_audio_element = enabled;
        }
        if let Some(volume) = self.initial_volume {
            settings.initial_volume = volume;
        }
        if let Some(interval) = self.position_interval {
            settings.position_interval_ms = u64::try_from(interval.as_millis()).map_err(|_| {
                Error::Config("Position interval does not fit in milliseconds".to_string())
            })?;
        }
        if let Some(limit) = self.max_concurrent_loads {
            settings.max_concurrent_loads = limit;
        }
        if let Some(size) = self.event_buffer_size {
            settings.event_buffer_size = size;
        }
        if let Some(base_url) = self.base_url {
            settings.base_url = base_url;
        }

        let config = CoreConfig {
            settings,
            device_hints: self
                .device_hints
                .unwrap_or_else(|| Arc::new(StaticDeviceHints::desktop())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
