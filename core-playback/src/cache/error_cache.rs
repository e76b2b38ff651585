//! Last failure per (normalized url, connection).

use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::locator::SoundUrl;

/// One recorded attempt failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Normalized url key
    pub url: String,
    pub connection: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
struct Records {
    next_seq: u64,
    by_key: HashMap<(String, String), (u64, ErrorRecord)>,
}

/// Append-or-replace store of attempt failures.
#[derive(Clone)]
pub struct ErrorCache {
    records: Arc<Mutex<Records>>,
    clock: Arc<dyn Clock>,
}

impl ErrorCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Records::default())),
            clock,
        }
    }

    /// Records a failure, replacing any earlier one for the same pair.
    pub fn record(&self, url: &SoundUrl, connection: &str, message: impl Into<String>) -> ErrorRecord {
        let record = ErrorRecord {
            url: url.key().to_string(),
            connection: connection.to_string(),
            message: message.into(),
            recorded_at: self.clock.now(),
        };

        let mut records = self.records.lock();
        records.next_seq += 1;
        let seq = records.next_seq;
        records.by_key.insert(
            (record.url.clone(), record.connection.clone()),
            (seq, record.clone()),
        );
        debug!(url = %record.url, connection, "attempt failure recorded");
        record
    }

    pub fn find(&self, url: &SoundUrl, connection: &str) -> Option<ErrorRecord> {
        self.records
            .lock()
            .by_key
            .get(&(url.key().to_string(), connection.to_string()))
            .map(|(_, record)| record.clone())
    }

    /// Every recorded failure for `url`, most recent last.
    pub fn errors_for(&self, url: &SoundUrl) -> Vec<ErrorRecord> {
        let records = self.records.lock();
        let mut matching: Vec<&(u64, ErrorRecord)> = records
            .by_key
            .iter()
            .filter(|((key, _), _)| key == url.key())
            .map(|(_, entry)| entry)
            .collect();
        matching.sort_by_key(|(seq, _)| *seq);
        matching.into_iter().map(|(_, record)| record.clone()).collect()
    }

    pub fn has_errors(&self, url: &SoundUrl) -> bool {
        self.records
            .lock()
            .by_key
            .keys()
            .any(|(key, _)| key == url.key())
    }

    pub fn remove(&self, url: &SoundUrl, connection: &str) -> Option<ErrorRecord> {
        self.records
            .lock()
            .by_key
            .remove(&(url.key().to_string(), connection.to_string()))
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().by_key.is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().by_key.clear();
    }
}

impl std::fmt::Debug for ErrorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCache").field("len", &self.len()).finish()
    }
}
