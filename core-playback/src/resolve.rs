//! Url input resolution.
//!
//! Callers can hand `load`/`play` a single locator, an ordered list, or a
//! future that produces the list later (e.g. a playlist fetched over the
//! network). Resolution turns any of those into the ordered, deduplicated
//! list of [`SoundUrl`]s the planner works on.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use tracing::debug;
use url::Url;

use crate::error::{PlaybackError, Result};
use crate::locator::{SoundLocator, SoundUrl};

/// What a caller may pass as the url argument.
pub enum UrlInput {
    One(SoundLocator),
    Many(Vec<SoundLocator>),
    /// Resolved on demand; an `Err` rejects the load.
    Deferred(BoxFuture<'static, std::result::Result<Vec<SoundLocator>, String>>),
}

impl UrlInput {
    /// Wraps a future producing the locators. Its error is kept as text.
    pub fn deferred<F, E>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<Vec<SoundLocator>, E>> + Send + 'static,
        E: fmt::Display,
    {
        UrlInput::Deferred(future.map(|result| result.map_err(|e| e.to_string())).boxed())
    }

    /// Raw urls, when known without awaiting anything.
    pub fn describe(&self) -> Option<Vec<String>> {
        match self {
            UrlInput::One(locator) => Some(vec![locator.url.clone()]),
            UrlInput::Many(locators) => Some(locators.iter().map(|l| l.url.clone()).collect()),
            UrlInput::Deferred(_) => None,
        }
    }
}

impl fmt::Debug for UrlInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlInput::One(locator) => f.debug_tuple("One").field(locator).finish(),
            UrlInput::Many(locators) => f.debug_tuple("Many").field(locators).finish(),
            UrlInput::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<SoundLocator> for UrlInput {
    fn from(locator: SoundLocator) -> Self {
        UrlInput::One(locator)
    }
}

impl From<&str> for UrlInput {
    fn from(url: &str) -> Self {
        UrlInput::One(url.into())
    }
}

impl From<String> for UrlInput {
    fn from(url: String) -> Self {
        UrlInput::One(url.into())
    }
}

impl From<Vec<SoundLocator>> for UrlInput {
    fn from(locators: Vec<SoundLocator>) -> Self {
        UrlInput::Many(locators)
    }
}

impl From<Vec<&str>> for UrlInput {
    fn from(urls: Vec<&str>) -> Self {
        UrlInput::Many(urls.into_iter().map(SoundLocator::from).collect())
    }
}

impl From<Vec<String>> for UrlInput {
    fn from(urls: Vec<String>) -> Self {
        UrlInput::Many(urls.into_iter().map(SoundLocator::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for UrlInput {
    fn from(urls: [&str; N]) -> Self {
        UrlInput::Many(urls.into_iter().map(SoundLocator::from).collect())
    }
}

/// Turns a [`UrlInput`] into the urls to attempt.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Returns a non-empty, ordered list without duplicate cache keys.
    async fn resolve(&self, input: UrlInput) -> Result<Vec<SoundUrl>>;
}

/// Joins every locator against a base url and drops later duplicates.
#[derive(Debug, Clone)]
pub struct DefaultUrlResolver {
    base: Url,
}

impl DefaultUrlResolver {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn normalize(&self, locators: Vec<SoundLocator>) -> Result<Vec<SoundUrl>> {
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(locators.len());

        for locator in locators {
            let url = SoundUrl::parse(locator, &self.base)?;
            if seen.insert(url.key().to_string()) {
                urls.push(url);
            } else {
                debug!(key = url.key(), "dropping duplicate url");
            }
        }

        if urls.is_empty() {
            return Err(PlaybackError::Resolution("no urls given".to_string()));
        }
        Ok(urls)
    }
}

#[async_trait]
impl UrlResolver for DefaultUrlResolver {
    async fn resolve(&self, input: UrlInput) -> Result<Vec<SoundUrl>> {
        let locators = match input {
            UrlInput::One(locator) => vec![locator],
            UrlInput::Many(locators) => locators,
            UrlInput::Deferred(future) => future.await.map_err(PlaybackError::Resolution)?,
        };
        self.normalize(locators)
    }
}
