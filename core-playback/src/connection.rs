//! Registry of active connections.
//!
//! Hosts hand the orchestrator a catalog of every connection implementation
//! they ship. The settings then name which of those are active and in what
//! order; that order is the default attempt order for each url.

use core_runtime::config::ConnectionSettings;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PlaybackError, Result};
use crate::traits::Connection;

/// An activated connection together with the options it was set up with.
#[derive(Clone)]
pub struct RegisteredConnection {
    pub name: String,
    pub connection: Arc<dyn Connection>,
    pub options: Option<Value>,
}

impl fmt::Debug for RegisteredConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredConnection")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// Ordered set of active connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Vec<RegisteredConnection>,
}

impl ConnectionRegistry {
    /// Activates `settings` against `catalog`, preserving the settings order.
    ///
    /// Every named connection must exist in the catalog and accept its
    /// options; connections configured without options are set up with `{}`. An empty settings list yields an empty registry; loads then
    /// fail with [`PlaybackError::NoConnections`].
    pub fn activate(
        catalog: &[Arc<dyn Connection>],
        settings: &[ConnectionSettings],
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(settings.len());

        for setting in settings {
            let connection = catalog
                .iter()
                .find(|candidate| candidate.name() == setting.name)
                .cloned()
                .ok_or_else(|| {
                    warn!(connection = %setting.name, "configured connection is not available");
                    PlaybackError::UnknownConnection(setting.name.clone())
                })?;

            let options = setting
                .options
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default()));
            connection
                .setup(&options)
                .map_err(|e| PlaybackError::ConnectionSetup {
                    name: setting.name.clone(),
                    message: e.to_string(),
                })?;

            debug!(connection = %setting.name, "connection activated");
            entries.push(RegisteredConnection {
                name: setting.name.clone(),
                connection,
                options: setting.options.clone(),
            });
        }

        Ok(Self { entries })
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredConnection> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegisteredConnection> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestConnection;
    use serde_json::json;

    fn catalog() -> Vec<Arc<dyn Connection>> {
        vec![
            Arc::new(TestConnection::new("NativeAudio", &["mp3"])),
            Arc::new(TestConnection::new("WebAudio", &["mp3", "ogg"])),
        ]
    }

    #[test]
    fn test_activation_keeps_settings_order() {
        let registry = ConnectionRegistry::activate(
            &catalog(),
            &[
                ConnectionSettings::new("WebAudio"),
                ConnectionSettings::new("NativeAudio"),
            ],
        )
        .unwrap();

        assert_eq!(registry.names(), vec!["WebAudio", "NativeAudio"]);
        assert!(registry.get("NativeAudio").is_some());
        assert!(registry.get("Flash").is_none());
    }

    #[test]
    fn test_unknown_connection_is_rejected() {
        let err = ConnectionRegistry::activate(&catalog(), &[ConnectionSettings::new("Flash")])
            .unwrap_err();
        assert!(matches!(err, PlaybackError::UnknownConnection(name) if name == "Flash"));
    }

    #[test]
    fn test_setup_failure_is_reported() {
        let err = ConnectionRegistry::activate(
            &catalog(),
            &[ConnectionSettings::new("WebAudio").with_options(json!({ "fail": true }))],
        )
        .unwrap_err();
        assert!(matches!(err, PlaybackError::ConnectionSetup { name, .. } if name == "WebAudio"));
    }

    #[test]
    fn test_every_connection_is_set_up_once() {
        let native = Arc::new(TestConnection::new("NativeAudio", &["mp3"]));
        let web = Arc::new(TestConnection::new("WebAudio", &["mp3", "ogg"]));
        let catalog: Vec<Arc<dyn Connection>> = vec![native.clone(), web.clone()];

        let registry = ConnectionRegistry::activate(
            &catalog,
            &[
                ConnectionSettings::new("NativeAudio"),
                ConnectionSettings::new("WebAudio").with_options(json!({ "gain": 1 })),
            ],
        )
        .unwrap();

        assert_eq!(native.setups(), vec![json!({})]);
        assert_eq!(web.setups(), vec![json!({ "gain": 1 })]);
        assert_eq!(registry.get("NativeAudio").unwrap().options, None);
        assert_eq!(
            registry.get("WebAudio").unwrap().options,
            Some(json!({ "gain": 1 }))
        );
    }

    #[test]
    fn test_empty_settings_yield_empty_registry() {
        let registry = ConnectionRegistry::activate(&catalog(), &[]).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
