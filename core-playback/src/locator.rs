//! Sound locators and their normalized form.
//!
//! A [`SoundLocator`] is what callers pass in: a raw url string, possibly
//! relative, optionally tagged with a mime type. A [`SoundUrl`] is the resolved
//! absolute url plus the cache key used by the sound and error caches: origin
//! followed by path, with query string and fragment dropped. Two locators that
//! differ only in their query therefore share one cached sound.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

use crate::error::{PlaybackError, Result};

/// A caller-supplied sound location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundLocator {
    pub url: String,
    /// Explicit media type, when the url alone does not reveal it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl SoundLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl From<&str> for SoundLocator {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for SoundLocator {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl From<&String> for SoundLocator {
    fn from(url: &String) -> Self {
        Self::new(url.clone())
    }
}

/// A resolved, absolute sound url with its cache key.
///
/// Equality and hashing use the cache key only.
#[derive(Debug, Clone)]
pub struct SoundUrl {
    href: Url,
    key: String,
    mime_type: Option<String>,
}

impl SoundUrl {
    /// Resolves `locator` against `base`. Absolute locators ignore the base.
    pub fn parse(locator: impl Into<SoundLocator>, base: &Url) -> Result<Self> {
        let locator = locator.into();
        let raw = locator.url.trim();
        if raw.is_empty() {
            return Err(PlaybackError::Resolution("empty url".to_string()));
        }

        let href = base
            .join(raw)
            .map_err(|e| PlaybackError::Resolution(format!("invalid url '{}': {}", raw, e)))?;
        let key = cache_key(&href);

        Ok(Self {
            href,
            key,
            mime_type: locator.mime_type,
        })
    }

    /// Full absolute url, including query and fragment.
    pub fn as_str(&self) -> &str {
        self.href.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.href
    }

    /// Normalized key shared by every url that names the same resource.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        self.href.path()
    }

    /// Lowercased file extension of the last path segment.
    pub fn extension(&self) -> Option<String> {
        let segment = self.href.path_segments()?.last()?;
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Explicit mime type, or one guessed from the extension.
    pub fn mime_type(&self) -> Option<String> {
        if let Some(mime) = &self.mime_type {
            return Some(mime.clone());
        }
        let mime = match self.extension()?.as_str() {
            "mp3" => "audio/mpeg",
            "aac" => "audio/aac",
            "m4a" | "mp4" => "audio/mp4",
            "ogg" | "oga" | "opus" => "audio/ogg",
            "wav" => "audio/wav",
            "flac" => "audio/flac",
            "webm" => "audio/webm",
            "m3u8" => "application/vnd.apple.mpegurl",
            _ => return None,
        };
        Some(mime.to_string())
    }
}

fn cache_key(url: &Url) -> String {
    let origin = url.origin();
    if origin.is_tuple() {
        format!("{}{}", origin.ascii_serialization(), url.path())
    } else {
        // blob:, data: and other opaque origins serialize as "null"
        format!("{}:{}", url.scheme(), url.path())
    }
}

impl PartialEq for SoundUrl {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SoundUrl {}

impl Hash for SoundUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for SoundUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.href.as_str())
    }
}
